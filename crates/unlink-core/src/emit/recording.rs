//! In-memory [`ObjectSink`] that records every call verbatim, for
//! assertions in driver tests (mirrors the teacher's preference for
//! hand-built fixtures over mocking frameworks).

use super::sink::ObjectSink;

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    First,
    Last,
    Comment(String),
    Dict(Vec<String>),
    Mod(String, u8),
    Size(usize),
    Contents(Vec<u8>),
    Entry(usize, String),
    SimpleRef(String, u8, usize),
    WeirdRef(String, u8, usize),
}

#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub events: Vec<SinkEvent>,
}

impl ObjectSink for RecordingSink {
    fn putfirst(&mut self) {
        self.events.push(SinkEvent::First);
    }
    fn putlast(&mut self) {
        self.events.push(SinkEvent::Last);
    }
    fn putcomment(&mut self, text: &str) {
        self.events.push(SinkEvent::Comment(text.to_string()));
    }
    fn putdict(&mut self, names: &[String]) {
        self.events.push(SinkEvent::Dict(names.to_vec()));
    }
    fn putmod(&mut self, name: &str, flags: u8) {
        self.events.push(SinkEvent::Mod(name.to_string(), flags));
    }
    fn putsize(&mut self, n: usize) {
        self.events.push(SinkEvent::Size(n));
    }
    fn putcontents(&mut self, bytes: &[u8]) {
        self.events.push(SinkEvent::Contents(bytes.to_vec()));
    }
    fn putentry(&mut self, offset: usize, label: &str) {
        self.events.push(SinkEvent::Entry(offset, label.to_string()));
    }
    fn putsimpleref(&mut self, label: &str, width: u8, site: usize) {
        self.events
            .push(SinkEvent::SimpleRef(label.to_string(), width, site));
    }
    fn putweirdref(&mut self, label: &str, width: u8, site: usize) {
        self.events
            .push(SinkEvent::WeirdRef(label.to_string(), width, site));
    }
}
