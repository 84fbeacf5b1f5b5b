//! Object emission (§4.10, §6): the `ObjectSink` trait plus its two
//! implementations, and the module/file-range driver that calls into one.

pub mod object_writer;
pub mod recording;
pub mod sink;

pub use object_writer::ObjectFileWriter;
pub use recording::{RecordingSink, SinkEvent};
pub use sink::{ObjectSink, FLAG_EXTERNALLY_ACCESSIBLE, FLAG_FORCED};
