//! Dump source seam.
//!
//! A source is whatever produces the contents of a dump, usually a live
//! server connection. It reports who it is, then emits block descriptors
//! and data chunks in any interleaving until it is exhausted.

use std::collections::VecDeque;

use uuid::Uuid;

use crate::error::DumpResult;
use crate::format::{BlockDescriptor, ServerInfo};

/// One item produced by a dump source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpEvent {
    /// Metadata of one schema object.
    Descriptor(BlockDescriptor),
    /// One data chunk of a schema object.
    Chunk {
        /// Owning schema object.
        object_id: Uuid,
        /// Raw chunk bytes.
        data: Vec<u8>,
    },
}

/// Producer of dump contents.
pub trait DumpSource {
    /// Server information, requested once before any event.
    fn server_info(&mut self) -> DumpResult<ServerInfo>;

    /// Next descriptor or chunk, or `None` once everything was delivered.
    fn next_event(&mut self) -> DumpResult<Option<DumpEvent>>;
}

/// In-memory dump source.
#[derive(Debug, Clone)]
pub struct MemorySource {
    server: ServerInfo,
    events: VecDeque<DumpEvent>,
}

impl MemorySource {
    /// Source with no events.
    pub fn new(server: ServerInfo) -> Self {
        MemorySource {
            server,
            events: VecDeque::new(),
        }
    }

    /// Queue a descriptor.
    pub fn push_descriptor(&mut self, descriptor: BlockDescriptor) -> &mut Self {
        self.events.push_back(DumpEvent::Descriptor(descriptor));
        self
    }

    /// Queue a chunk.
    pub fn push_chunk(&mut self, object_id: Uuid, data: impl Into<Vec<u8>>) -> &mut Self {
        self.events.push_back(DumpEvent::Chunk {
            object_id,
            data: data.into(),
        });
        self
    }

    /// Queue a descriptor that matches `chunks`, followed by the chunks.
    pub fn push_object(
        &mut self,
        object_id: Uuid,
        schema_deps: Vec<Uuid>,
        type_desc: Vec<u8>,
        chunks: Vec<Vec<u8>>,
    ) -> &mut Self {
        let data_size = chunks.iter().map(|c| c.len() as u64).sum();
        let descriptor = BlockDescriptor::new(object_id, data_size, chunks.len() as u64)
            .with_deps(schema_deps)
            .with_type_desc(type_desc);
        self.push_descriptor(descriptor);
        for chunk in chunks {
            self.push_chunk(object_id, chunk);
        }
        self
    }

    /// Events not yet delivered.
    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl DumpSource for MemorySource {
    fn server_info(&mut self) -> DumpResult<ServerInfo> {
        Ok(self.server.clone())
    }

    fn next_event(&mut self) -> DumpResult<Option<DumpEvent>> {
        Ok(self.events.pop_front())
    }
}
