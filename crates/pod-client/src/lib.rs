// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod bencode;
pub mod cancel;
pub mod codec;
pub mod error;
pub mod namespace;
pub mod pod;
pub mod process_registry;
pub mod processor;
pub mod registry;
pub mod resolver;
pub mod spec;
pub mod transport;
pub mod value;

pub use cancel::CancelToken;
pub use codec::{PayloadCodec, PayloadFormat, TagReader};
pub use error::PodError;
pub use namespace::{Namespace, Var, VarBody};
pub use pod::{InvokeOptions, Pod, load_pod};
pub use process_registry::{destroy_all, list, lookup, register, unregister};
pub use registry::{CallRegistry, StreamEvent, Waiter};
pub use resolver::{PassthroughResolver, PodResolver};
pub use spec::{LoadOptions, PodSpec, TransportKind};
pub use value::{Ident, PodValue};
