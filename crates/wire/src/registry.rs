//! Tag to message-kind lookup
//!
//! One registry exists per direction. Within a direction a tag maps either
//! to exactly one plain kind, or to a family of kinds told apart by a
//! leading `u32` discriminator. Any other overlap is an ambiguous catalog
//! and is rejected when the registry is built.

use crate::catalog::MESSAGE_SPECS;
use crate::error::{WireError, WireResult};
use crate::message::{Direction, MessageKind};
use dbdump_core::ByteCursor;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use tracing::trace;

#[derive(Debug)]
enum TagEntry {
    Plain(MessageKind),
    Discriminated(Vec<(u32, MessageKind)>),
}

/// Message kinds registered for one direction, keyed by tag
#[derive(Debug)]
pub struct MessageRegistry {
    direction: Direction,
    entries: HashMap<u8, TagEntry>,
}

static SERVER_REGISTRY: Lazy<MessageRegistry> = Lazy::new(|| built_in(Direction::Server));
static CLIENT_REGISTRY: Lazy<MessageRegistry> = Lazy::new(|| built_in(Direction::Client));

fn built_in(direction: Direction) -> MessageRegistry {
    let kinds = MESSAGE_SPECS
        .iter()
        .filter(|spec| spec.direction == direction)
        .map(|spec| spec.kind);
    match MessageRegistry::build(direction, kinds) {
        Ok(registry) => registry,
        // The catalog is static; the registry tests pin it unambiguous.
        Err(e) => panic!("built-in message catalog is ambiguous: {}", e),
    }
}

impl MessageRegistry {
    /// Registry for the built-in catalog
    pub fn for_direction(direction: Direction) -> &'static MessageRegistry {
        match direction {
            Direction::Server => &SERVER_REGISTRY,
            Direction::Client => &CLIENT_REGISTRY,
        }
    }

    /// Build a registry from `kinds`, all sent in `direction`.
    pub fn build(
        direction: Direction,
        kinds: impl IntoIterator<Item = MessageKind>,
    ) -> WireResult<Self> {
        let mut entries: HashMap<u8, TagEntry> = HashMap::new();

        for kind in kinds {
            let tag = kind.tag();
            let entry = entries.remove(&tag);
            let merged = match (entry, kind.discriminator()) {
                (None, None) => TagEntry::Plain(kind),
                (None, Some(d)) => TagEntry::Discriminated(vec![(d, kind)]),
                (Some(TagEntry::Discriminated(mut family)), Some(d)) => {
                    if let Some(&(_, other)) = family.iter().find(|(existing, _)| *existing == d) {
                        return Err(ambiguous(tag, &[other, kind]));
                    }
                    family.push((d, kind));
                    TagEntry::Discriminated(family)
                }
                (Some(TagEntry::Plain(other)), _) => return Err(ambiguous(tag, &[other, kind])),
                (Some(TagEntry::Discriminated(family)), None) => {
                    let mut kinds: Vec<MessageKind> = family.iter().map(|&(_, k)| k).collect();
                    kinds.push(kind);
                    return Err(ambiguous(tag, &kinds));
                }
            };
            entries.insert(tag, merged);
        }

        Ok(MessageRegistry { direction, entries })
    }

    /// Direction served by this registry
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Resolve the kind of a message body received with `tag`.
    ///
    /// For discriminated tags the leading `u32` of `body` is peeked, not
    /// consumed.
    pub fn lookup(&self, tag: u8, body: &[u8]) -> WireResult<MessageKind> {
        let entry = self.entries.get(&tag).ok_or(WireError::UnknownTag {
            tag: char::from(tag),
            direction: self.direction.as_str(),
        })?;

        match entry {
            TagEntry::Plain(kind) => Ok(*kind),
            TagEntry::Discriminated(family) => {
                let status = ByteCursor::new(body)
                    .read_u32()
                    .map_err(|e| WireError::cursor(format!("{:?}.discriminator", char::from(tag)), e))?;
                trace!(tag = %char::from(tag), status, "Resolving discriminated message");
                family
                    .iter()
                    .find(|&&(d, _)| d == status)
                    .map(|&(_, kind)| kind)
                    .ok_or(WireError::UnknownTag {
                        tag: char::from(tag),
                        direction: self.direction.as_str(),
                    })
            }
        }
    }

    /// Whether any kind is registered for `tag`
    pub fn contains_tag(&self, tag: u8) -> bool {
        self.entries.contains_key(&tag)
    }
}

fn ambiguous(tag: u8, kinds: &[MessageKind]) -> WireError {
    WireError::AmbiguousTag {
        tag: char::from(tag),
        kinds: kinds
            .iter()
            .map(|k| k.name())
            .collect::<Vec<_>>()
            .join(", "),
    }
}
