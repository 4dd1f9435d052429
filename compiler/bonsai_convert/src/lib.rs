//! Bonsai convert - the boundary between slim and native trees.
//!
//! A slim tree names its types and members by descriptor. Before it can run,
//! every descriptor has to be resolved against the host and every node
//! rebuilt in the native algebra. This crate does both:
//! - [`TypeSpace`]: a session-scoped memo from descriptors to runtime
//!   handles, which callers may pre-seed and reuse across conversions
//! - [`SlimToNative`]: the bottom-up conversion, driving any
//!   [`NodeFactory`](bonsai_native::NodeFactory)
//! - [`NativeToSlim`]: the way back, producing canonical slim trees
//!
//! # Identity
//!
//! Each distinct parameter or label target converts to exactly one handle
//! on the other side, however many times it occurs. Both converters keep
//! identity-keyed memo tables for the purpose.
//!
//! # Tracing
//!
//! Conversions emit `tracing` spans and events. Call [`init_tracing`] and set
//! `RUST_LOG=bonsai_convert=debug` (or `trace`) to see them.

mod error;
mod to_native;
mod to_slim;
mod type_space;

use std::sync::Once;

use bonsai_ir::Expr;
use bonsai_native::{DefaultFactory, NativeExpr};

pub use error::{ConvertError, ResolutionError};
pub use to_native::SlimToNative;
pub use to_slim::NativeToSlim;
pub use type_space::TypeSpace;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call more than once. Does nothing unless `RUST_LOG` is set.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}

/// Knobs of a slim-to-native conversion.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Emit reference (in)equality for `==`/`!=` between two reference
    /// types that name no operator method.
    pub lower_reference_equality: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            lower_reference_equality: true,
        }
    }
}

/// Convert `expr` with the unrestricted factory over `space`'s registry.
pub fn to_native(expr: &Expr, space: &mut TypeSpace) -> Result<NativeExpr, ConvertError> {
    let factory = DefaultFactory::new(space.registry().clone());
    SlimToNative::with_factory(factory, ConvertOptions::default()).convert(expr, space)
}

/// Convert a native tree back to slim form.
pub fn to_slim(expr: &NativeExpr, space: &TypeSpace) -> Result<Expr, ConvertError> {
    NativeToSlim::new(space).convert(expr)
}
