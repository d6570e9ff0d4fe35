//! Shared compiled program objects.
//!
//! Compiling and linking shaders is expensive, and many logical
//! [`super::Program`]s are built from identical source. [`ProgramData`] is
//! the compiled/linked object, cached per context in a [`ProgramRegistry`]
//! keyed by the concatenated source strings and reference-counted: the GPU
//! program is deleted only when the last logical program releases it.
//!
//! After a successful link the program is reflected once: active uniforms
//! have their names decomposed into struct/array addressing metadata, and
//! active attributes are recorded in location order - that ordering
//! signature is what geometries key their VAO caches on.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::errors::{OpalError, Result};
use crate::gl::{Context, GlApi, GlslType, ProgramId, ShaderStage, UniformLocation};

use super::ProgramDataKey;

static NEXT_PROGRAM_DATA_ID: AtomicU32 = AtomicU32::new(1);

/// How a uniform value is addressed from the application-side value map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniformAddress {
    /// `color` or `weights[0]` - looked up directly by base name.
    Plain,
    /// `material.shininess` - a field of a struct value.
    StructField(String),
    /// `lights[2].color` - a field of one element of a struct array.
    StructArrayField { index: usize, field: String },
}

/// One active uniform, with its addressing metadata parsed at link time.
#[derive(Debug, Clone)]
pub struct ActiveUniform {
    /// Full name as reported by reflection.
    pub name: String,
    /// Base name used to look up the supplied value.
    pub base: String,
    pub address: UniformAddress,
    pub ty: GlslType,
    /// Array length (1 for non-arrays).
    pub size: u32,
    pub location: UniformLocation,
}

/// One active attribute and the location it was assigned.
#[derive(Debug, Clone)]
pub struct ActiveAttribute {
    pub name: String,
    pub ty: GlslType,
    pub location: u32,
}

/// Reflection output of a linked program, shared immutably.
#[derive(Debug, Default)]
pub struct ProgramReflection {
    pub uniforms: Vec<ActiveUniform>,
    /// Active attributes sorted by location.
    pub attributes: Vec<ActiveAttribute>,
    /// Stable signature of the attribute binding order; geometries key
    /// their VAO caches on it.
    pub attribute_order: String,
}

/// The compiled/linked GPU program for one (vertex, fragment) source pair.
#[derive(Debug)]
pub struct ProgramData {
    pub id: u32,
    vertex: String,
    fragment: String,
    usage: u32,
    program: Option<ProgramId>,
    reflection: Arc<ProgramReflection>,
    /// Compile/link already failed and was reported; don't retry or re-log.
    failed: bool,
}

impl ProgramData {
    fn new(vertex: &str, fragment: &str) -> Self {
        Self {
            id: NEXT_PROGRAM_DATA_ID.fetch_add(1, Ordering::Relaxed),
            vertex: vertex.to_owned(),
            fragment: fragment.to_owned(),
            usage: 1,
            program: None,
            reflection: Arc::new(ProgramReflection::default()),
            failed: false,
        }
    }

    fn cache_key(vertex: &str, fragment: &str) -> String {
        let mut key = String::with_capacity(vertex.len() + fragment.len());
        key.push_str(vertex);
        key.push_str(fragment);
        key
    }

    /// Number of logical programs referencing this compiled object.
    #[must_use]
    pub fn usage(&self) -> u32 {
        self.usage
    }

    /// The linked GPU object, once linking succeeded.
    #[must_use]
    pub fn program(&self) -> Option<ProgramId> {
        self.program
    }

    #[must_use]
    pub fn reflection(&self) -> &Arc<ProgramReflection> {
        &self.reflection
    }
}

/// Per-context cache of [`ProgramData`], keyed by source identity.
#[derive(Debug, Default)]
pub(crate) struct ProgramRegistry {
    entries: SlotMap<ProgramDataKey, ProgramData>,
    by_source: FxHashMap<String, ProgramDataKey>,
}

impl ProgramRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Context {
    /// Resolves shared program data for a source pair: a cache hit bumps the
    /// usage count, a miss creates an un-compiled entry.
    pub fn acquire_program_data(&mut self, vertex: &str, fragment: &str) -> ProgramDataKey {
        let cache_key = ProgramData::cache_key(vertex, fragment);
        if let Some(&key) = self.programs.by_source.get(&cache_key) {
            if let Some(data) = self.programs.entries.get_mut(key) {
                data.usage += 1;
                return key;
            }
        }
        let key = self.programs.entries.insert(ProgramData::new(vertex, fragment));
        self.programs.by_source.insert(cache_key, key);
        key
    }

    /// Bumps the usage count of an already-acquired entry (program cloning).
    pub fn retain_program_data(&mut self, key: ProgramDataKey) {
        if let Some(data) = self.programs.entries.get_mut(key) {
            data.usage += 1;
        }
    }

    /// Releases one reference; the GPU program is deleted and the cache
    /// entry dropped when the count reaches zero.
    pub fn release_program_data(&mut self, key: ProgramDataKey) {
        let Some(data) = self.programs.entries.get_mut(key) else {
            return;
        };
        data.usage = data.usage.saturating_sub(1);
        if data.usage > 0 {
            return;
        }

        let cache_key = ProgramData::cache_key(&data.vertex, &data.fragment);
        let data_id = data.id;
        let program = data.program.take();
        self.programs.entries.remove(key);
        self.programs.by_source.remove(&cache_key);
        if let Some(id) = program {
            if self.state.current_program == Some(data_id) {
                self.state.current_program = None;
            }
            self.api_mut().delete_program(id);
        }
    }

    #[must_use]
    pub fn program_data(&self, key: ProgramDataKey) -> Option<&ProgramData> {
        self.programs.entries.get(key)
    }

    /// Number of live compiled-program cache entries, mostly for tests and
    /// leak diagnostics.
    #[must_use]
    pub fn program_data_count(&self) -> usize {
        self.programs.len()
    }

    /// Compiles, links and reflects the entry if needed.
    ///
    /// A previously linked program is revalidated with `is_program` so that
    /// context loss triggers a transparent recompile. Compile and link
    /// failures are reported once, with line-numbered source, and leave the
    /// entry inert: later prepares return [`OpalError::ProgramUnavailable`]
    /// without re-logging.
    pub fn prepare_program_data(&mut self, key: ProgramDataKey) -> Result<Arc<ProgramReflection>> {
        let Some(data) = self.programs.entries.get(key) else {
            return Err(OpalError::MissingResource {
                kind: "program data",
            });
        };

        if let Some(program) = data.program {
            if self.api().is_program(program) {
                return Ok(data.reflection.clone());
            }
        }
        if data.failed {
            return Err(OpalError::ProgramUnavailable);
        }

        let vertex_src = data.vertex.clone();
        let fragment_src = data.fragment.clone();

        let api = self.api_mut();
        let (vertex_shader, vertex_log) = api.compile_shader(ShaderStage::Vertex, &vertex_src);
        if !vertex_log.is_empty() {
            log::warn!(
                "{vertex_log}\nVertex Shader\n{}",
                add_line_numbers(&vertex_src)
            );
        }
        let (fragment_shader, fragment_log) =
            api.compile_shader(ShaderStage::Fragment, &fragment_src);
        if !fragment_log.is_empty() {
            log::warn!(
                "{fragment_log}\nFragment Shader\n{}",
                add_line_numbers(&fragment_src)
            );
        }

        let (program, link_log) = api.link_program(vertex_shader, fragment_shader);
        api.delete_shader(vertex_shader);
        api.delete_shader(fragment_shader);

        let Some(program) = program else {
            log::warn!("program link failed: {link_log}");
            if let Some(data) = self.programs.entries.get_mut(key) {
                data.failed = true;
            }
            if !vertex_log.is_empty() {
                return Err(OpalError::ShaderCompile {
                    stage: "vertex",
                    log: vertex_log,
                });
            }
            if !fragment_log.is_empty() {
                return Err(OpalError::ShaderCompile {
                    stage: "fragment",
                    log: fragment_log,
                });
            }
            return Err(OpalError::ProgramLink { log: link_log });
        };

        // Reflect active uniforms, decomposing struct/array names once.
        let mut uniforms = Vec::new();
        for input in self.api().active_uniforms(program) {
            let Some(location) = self.api().uniform_location(program, &input.name) else {
                continue;
            };
            let (base, address) = parse_uniform_name(&input.name);
            uniforms.push(ActiveUniform {
                name: input.name,
                base,
                address,
                ty: input.ty,
                size: input.size,
                location,
            });
        }

        // Reflect active attributes and derive the binding-order signature.
        let mut attributes = Vec::new();
        for input in self.api().active_attributes(program) {
            let Some(location) = self.api().attribute_location(program, &input.name) else {
                continue;
            };
            attributes.push(ActiveAttribute {
                name: input.name,
                ty: input.ty,
                location,
            });
        }
        attributes.sort_by_key(|a| a.location);
        let attribute_order = attributes
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let reflection = Arc::new(ProgramReflection {
            uniforms,
            attributes,
            attribute_order,
        });

        let Some(data) = self.programs.entries.get_mut(key) else {
            return Err(OpalError::MissingResource {
                kind: "program data",
            });
        };
        let relinked = data.program.take().is_some();
        data.program = Some(program);
        data.reflection = reflection.clone();

        // A recompile invalidates whatever the mirror cached for the old
        // program object.
        let data_id = data.id;
        if relinked {
            if self.state.current_program == Some(data_id) {
                self.state.current_program = None;
            }
            self.state.uniform_values.retain(|(id, _), _| *id != data_id);
        }
        Ok(reflection)
    }

    /// Makes the entry's program current, eliding the call when it already
    /// is. Returns the entry id, or `None` when no usable program exists.
    pub(crate) fn bind_program(&mut self, key: ProgramDataKey) -> Option<u32> {
        let data = self.programs.entries.get(key)?;
        let program = data.program?;
        let id = data.id;

        if self.state.current_program != Some(id) {
            self.state.current_program = Some(id);
            self.api_mut().use_program(Some(program));
        }
        Some(id)
    }

    /// Context-teardown hook: deletes every cached program object.
    ///
    /// GPU handles are never left to garbage collection; a host dropping a
    /// context calls this explicitly.
    pub fn teardown(&mut self) {
        let programs: Vec<ProgramId> = self
            .programs
            .entries
            .values_mut()
            .filter_map(|data| data.program.take())
            .collect();
        for program in programs {
            self.api_mut().delete_program(program);
        }
        self.programs.entries.clear();
        self.programs.by_source.clear();
        self.state.current_program = None;
        self.state.uniform_values.clear();
    }
}

/// Splits a reflected uniform name into its base name and addressing mode.
///
/// `color` and `weights[0]` address plainly; `material.shininess` addresses
/// a struct field; `lights[2].color` addresses a field of an array element.
fn parse_uniform_name(name: &str) -> (String, UniformAddress) {
    let words: Vec<&str> = name
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|s| !s.is_empty())
        .collect();

    match words.as_slice() {
        [base, index, field] => {
            if let Ok(index) = index.parse::<usize>() {
                (
                    (*base).to_owned(),
                    UniformAddress::StructArrayField {
                        index,
                        field: (*field).to_owned(),
                    },
                )
            } else {
                ((*base).to_owned(), UniformAddress::Plain)
            }
        }
        [base, second] => {
            if second.parse::<usize>().is_ok() {
                // `weights[0]`: a plain array uniform.
                ((*base).to_owned(), UniformAddress::Plain)
            } else {
                (
                    (*base).to_owned(),
                    UniformAddress::StructField((*second).to_owned()),
                )
            }
        }
        [base] => ((*base).to_owned(), UniformAddress::Plain),
        _ => (name.to_owned(), UniformAddress::Plain),
    }
}

fn add_line_numbers(source: &str) -> String {
    source
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{}: {line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names() {
        let (base, address) = parse_uniform_name("uColor");
        assert_eq!(base, "uColor");
        assert_eq!(address, UniformAddress::Plain);
    }

    #[test]
    fn plain_array_names() {
        let (base, address) = parse_uniform_name("weights[0]");
        assert_eq!(base, "weights");
        assert_eq!(address, UniformAddress::Plain);
    }

    #[test]
    fn struct_field_names() {
        let (base, address) = parse_uniform_name("material.shininess");
        assert_eq!(base, "material");
        assert_eq!(address, UniformAddress::StructField("shininess".into()));
    }

    #[test]
    fn struct_array_field_names() {
        let (base, address) = parse_uniform_name("lights[2].color");
        assert_eq!(base, "lights");
        assert_eq!(
            address,
            UniformAddress::StructArrayField {
                index: 2,
                field: "color".into()
            }
        );
    }

    #[test]
    fn line_numbering() {
        assert_eq!(add_line_numbers("a\nb"), "1: a\n2: b");
    }
}
