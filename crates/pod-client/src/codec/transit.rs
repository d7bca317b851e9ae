// SPDX-License-Identifier: MIT OR Apache-2.0
//! Transit+JSON payload codec — intentionally unimplemented.
//!
//! No Transit+JSON crate is part of this build's dependency stack.
//! [`super::codec_for`] returns a codec error for
//! [`super::PayloadFormat::TransitJson`] before reaching this module;
//! it exists so the format has a named home to grow into rather than
//! silently disappearing from the [`super::PayloadFormat`] enum.
