//! Support for stateful decoding: a decoder bound to a specific source and
//! transfer syntax, tracking how many bytes it has consumed.

pub mod decode;
