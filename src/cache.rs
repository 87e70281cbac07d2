//! Codec cache and descriptor resolution.
//!
//! Codecs are cached per schema generation. A resolve under a new generation
//! discards every codec of the previous one; type ids are not stable across
//! generations. The cache contents are never mutated in place: each resolve
//! builds against a snapshot, then merges into whatever snapshot is current
//! under the write lock and swaps the result in. Concurrent decoders keep
//! using the snapshot they started with.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use uuid::Uuid;

use crate::codecs::{ArrayCodec, Codec, EnumCodec, SetCodec, TupleCodec, base_scalar};
use crate::descriptors::{TypeDescriptor, parse_stream};
use crate::error::{Error, Result};

/// Version marker of the server's active type descriptor set: the id of the
/// state type descriptor announced by StateDataDescription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaGeneration(pub Uuid);

impl std::fmt::Display for SchemaGeneration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    generation: Option<SchemaGeneration>,
    codecs: HashMap<Uuid, Arc<Codec>>,
}

/// Codec cache shared by everything decoding under one schema generation.
#[derive(Debug, Default)]
pub struct CodecCache {
    current: RwLock<Arc<Snapshot>>,
}

impl CodecCache {
    /// Create a new, empty cache with no generation.
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Generation of the cached codecs, if any were resolved yet.
    pub fn generation(&self) -> Option<SchemaGeneration> {
        self.snapshot().generation
    }

    /// Number of cached codecs.
    pub fn len(&self) -> usize {
        self.snapshot().codecs.len()
    }

    /// True if no codecs are cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached codec for `type_id` under `generation`.
    pub fn lookup(&self, generation: SchemaGeneration, type_id: Uuid) -> Option<Arc<Codec>> {
        let snapshot = self.snapshot();
        if snapshot.generation != Some(generation) {
            return None;
        }
        snapshot.codecs.get(&type_id).cloned()
    }

    /// Switch to `generation`, dropping every cached codec if it differs from
    /// the current one. Returns true if the generation changed.
    pub fn set_generation(&self, generation: SchemaGeneration) -> bool {
        if self.snapshot().generation == Some(generation) {
            return false;
        }
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if current.generation == Some(generation) {
            return false;
        }
        tracing::debug!(
            "Schema generation changed {:?} -> {}, dropping {} codecs",
            current.generation,
            generation,
            current.codecs.len()
        );
        *current = Arc::new(Snapshot {
            generation: Some(generation),
            codecs: HashMap::new(),
        });
        true
    }

    /// Resolve a descriptor stream into its root codec.
    ///
    /// Descriptors already cached under `generation` are reused as-is, so
    /// resolving the same type twice yields the same node.
    pub fn resolve(&self, stream: Bytes, generation: SchemaGeneration) -> Result<Arc<Codec>> {
        self.set_generation(generation);
        let snapshot = self.snapshot();

        let descriptors = parse_stream(stream)?;
        let mut resolver = Resolver {
            cached: &snapshot.codecs,
            slots: Vec::with_capacity(descriptors.len()),
        };
        for descriptor in &descriptors {
            let slot = resolver.build(descriptor)?;
            resolver.slots.push(slot);
        }

        let (root_id, root) = descriptors
            .iter()
            .zip(&resolver.slots)
            .rev()
            .find(|(d, _)| !d.is_annotation())
            .map(|(d, slot)| slot.codec(d.id()).map(|codec| (d.id(), codec)))
            .ok_or_else(|| Error::Resolution {
                type_id: Uuid::nil(),
                message: "empty descriptor stream".into(),
            })??;

        let built = descriptors
            .iter()
            .zip(resolver.slots)
            .filter_map(|(descriptor, slot)| match slot {
                Slot::Codec(codec) => Some((descriptor.id(), codec)),
                Slot::Unsupported(_) | Slot::Annotation => None,
            })
            .collect();
        Ok(self.commit(generation, built, root_id, root))
    }

    /// Merge freshly built codecs into the current snapshot and return the
    /// cached node for `root_id`.
    ///
    /// Codecs already present win over `built`, so every caller observes one
    /// node per type id. If the generation moved on while resolving, nothing
    /// is cached and `root` is handed back as built.
    fn commit(
        &self,
        generation: SchemaGeneration,
        built: Vec<(Uuid, Arc<Codec>)>,
        root_id: Uuid,
        root: Arc<Codec>,
    ) -> Arc<Codec> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if current.generation != Some(generation) {
            tracing::debug!(
                "Schema generation moved to {:?} while resolving under {}, not caching",
                current.generation,
                generation
            );
            return root;
        }

        let mut codecs = current.codecs.clone();
        let before = codecs.len();
        for (type_id, codec) in built {
            codecs.entry(type_id).or_insert(codec);
        }
        let root = codecs.get(&root_id).map_or(root, Arc::clone);
        if codecs.len() != before {
            *current = Arc::new(Snapshot {
                generation: Some(generation),
                codecs,
            });
        }
        root
    }
}

/// Resolution result for one stream position.
enum Slot {
    Codec(Arc<Codec>),
    /// Parsed but not decodable by this client.
    Unsupported(String),
    Annotation,
}

impl Slot {
    fn codec(&self, type_id: Uuid) -> Result<Arc<Codec>> {
        match self {
            Slot::Codec(codec) => Ok(Arc::clone(codec)),
            Slot::Unsupported(reason) => Err(Error::UnsupportedShape {
                type_id,
                reason: reason.clone(),
            }),
            Slot::Annotation => Err(Error::Resolution {
                type_id,
                message: "reference to a type annotation".into(),
            }),
        }
    }
}

struct Resolver<'a> {
    cached: &'a HashMap<Uuid, Arc<Codec>>,
    slots: Vec<Slot>,
}

impl Resolver<'_> {
    /// Codec at an earlier position of the stream.
    fn at(&self, from: Uuid, pos: u16) -> Result<Arc<Codec>> {
        let slot = self.slots.get(usize::from(pos)).ok_or_else(|| Error::Resolution {
            type_id: from,
            message: format!(
                "reference to position {} before it is defined ({} resolved so far)",
                pos,
                self.slots.len()
            ),
        })?;
        slot.codec(from)
    }

    fn build(&self, descriptor: &TypeDescriptor) -> Result<Slot> {
        let id = descriptor.id();
        if !descriptor.is_annotation()
            && let Some(codec) = self.cached.get(&id)
        {
            return Ok(Slot::Codec(Arc::clone(codec)));
        }

        let codec = match descriptor {
            TypeDescriptor::BaseScalar { .. } => {
                return base_scalar(id).map(Slot::Codec).ok_or_else(|| Error::Resolution {
                    type_id: id,
                    message: "unknown base scalar".into(),
                });
            }
            TypeDescriptor::Scalar { base_type_pos, .. } => {
                self.at(id, *base_type_pos)?.with_type_id(id)?
            }
            TypeDescriptor::Enumeration(e) => Codec::Enum(EnumCodec::new(id, e.members.clone())),
            TypeDescriptor::Set { type_pos, .. } => {
                Codec::Set(SetCodec::new(id, self.at(id, *type_pos)?))
            }
            TypeDescriptor::Array {
                type_pos,
                dimensions,
                ..
            } => {
                if dimensions.len() != 1 {
                    return Err(Error::UnsupportedShape {
                        type_id: id,
                        reason: format!("array of {} dimensions", dimensions.len()),
                    });
                }
                Codec::Array(ArrayCodec::new(id, self.at(id, *type_pos)?))
            }
            TypeDescriptor::Tuple { element_types, .. } => {
                let elements = element_types
                    .iter()
                    .map(|pos| self.at(id, *pos))
                    .collect::<Result<Vec<_>>>()?;
                Codec::Tuple(TupleCodec::new(id, elements))
            }
            TypeDescriptor::ObjectShape { .. } => {
                return Ok(Slot::Unsupported("object shapes are not decoded".into()));
            }
            TypeDescriptor::NamedTuple { .. } => {
                return Ok(Slot::Unsupported("named tuples are not decoded".into()));
            }
            TypeDescriptor::InputShape { .. } => {
                return Ok(Slot::Unsupported("input shapes are not encoded".into()));
            }
            TypeDescriptor::Range { .. } => {
                return Ok(Slot::Unsupported("ranges are not decoded".into()));
            }
            TypeDescriptor::TypeAnnotation { annotation, .. } => {
                tracing::debug!("Skipping type annotation for {}: {}", id, annotation);
                return Ok(Slot::Annotation);
            }
        };
        Ok(Slot::Codec(Arc::new(codec)))
    }
}
