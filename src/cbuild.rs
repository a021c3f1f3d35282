//! Build-description input: `cbuild-gen-idx.yml` plus the
//! `cbuild-gen.yml` files it references, flattened into one
//! [`BuildParameters`] per declared subsystem.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Declared shape of the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum ProjectType {
    #[default]
    #[serde(rename = "single-core")]
    SingleCore,
    #[serde(rename = "multi-core")]
    MultiCore,
    #[serde(rename = "trustzone")]
    TrustZone,
}

/// Everything the pipeline needs to know about one subsystem, plus the
/// vendor context fields filled in by the context resolver.
#[derive(Debug, Clone, Default)]
pub struct BuildParameters {
    pub board: Option<String>,
    pub device: String,
    pub project_name: String,
    pub project_type: ProjectType,
    pub for_project_part: String,
    pub paired_secure_part: Option<String>,
    pub compiler: String,
    pub generator_map: String,
    pub output_dir: String,
    pub packs: Vec<String>,
    /// Vendor context identifier, e.g. `CortexM4`; empty when
    /// single-context. Set by the context resolver.
    pub cube_context: String,
    /// Vendor output folder, e.g. `CM4`; empty when single-context.
    pub cube_context_folder: String,
}

// ---------------------------------------------------------------------------
// YAML input shapes

#[derive(Debug, Deserialize)]
struct CbuildGenIdxFile {
    #[serde(rename = "build-gen-idx")]
    build_gen_idx: BuildGenIdx,
}

#[derive(Debug, Default, Deserialize)]
struct BuildGenIdx {
    #[serde(default)]
    generators: Vec<GeneratorEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct GeneratorEntry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    output: String,
    #[serde(default)]
    device: String,
    #[serde(default)]
    board: String,
    #[serde(rename = "project-type", default)]
    project_type: ProjectType,
    #[serde(rename = "cbuild-gens", default)]
    cbuild_gens: Vec<CbuildGenRef>,
}

#[derive(Debug, Default, Deserialize)]
struct CbuildGenRef {
    #[serde(rename = "cbuild-gen", default)]
    cbuild_gen: String,
    #[serde(default)]
    project: String,
    #[serde(rename = "for-project-part", default)]
    for_project_part: String,
    /// Generator map tag (`Appli`, `Boot`, `AppliSecure`, ...).
    #[serde(default)]
    map: String,
    #[serde(default)]
    output: String,
}

#[derive(Debug, Deserialize)]
struct CbuildGenFile {
    #[serde(rename = "build-gen")]
    build_gen: BuildGen,
}

#[derive(Debug, Default, Deserialize)]
struct BuildGen {
    #[serde(default)]
    project: String,
    #[serde(default)]
    compiler: String,
    #[serde(default)]
    board: String,
    #[serde(default)]
    device: String,
    #[serde(default)]
    processor: Processor,
    #[serde(default)]
    packs: Vec<PackRef>,
}

#[derive(Debug, Default, Deserialize)]
struct Processor {
    #[serde(default)]
    core: String,
    #[serde(default)]
    trustzone: String,
}

#[derive(Debug, Default, Deserialize)]
struct PackRef {
    #[serde(default)]
    pack: String,
}

// ---------------------------------------------------------------------------

/// Strip the vendor prefix from a `Vendor::Name` qualified identifier.
pub fn unqualified(name: &str) -> &str {
    match name.rsplit_once("::") {
        Some((_, right)) => right,
        None => name,
    }
}

/// Device name as the GUI wants it: unqualified, trailing `:<part>`
/// suffix removed.
pub fn device_for_gui(device: &str) -> &str {
    let device = unqualified(device);
    match device.split_once(':') {
        Some((left, _)) => left,
        None => device,
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.is_file() {
        return Err(Error::InputMissing { path: path.into() });
    }
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    serde_yaml::from_str(&text).map_err(|e| Error::malformed(path, e.to_string()))
}

/// Load the idx file and every `cbuild-gen.yml` it references.
pub fn read_idx(path: &Path) -> Result<Vec<BuildParameters>> {
    log::info!("reading build description: {}", path.display());
    let idx: CbuildGenIdxFile = read_yaml(path)?;
    let base = path.parent().unwrap_or(Path::new("."));

    let mut subsystems = Vec::new();
    for generator in &idx.build_gen_idx.generators {
        log::debug!(
            "generator {}: device {}, board {:?}, {} subsystem(s)",
            generator.id,
            generator.device,
            generator.board,
            generator.cbuild_gens.len()
        );
        for gen_ref in &generator.cbuild_gens {
            let gen_path = {
                let p = Path::new(&gen_ref.cbuild_gen);
                if p.is_absolute() {
                    p.to_path_buf()
                } else {
                    base.join(p)
                }
            };
            let gen: CbuildGenFile = read_yaml(&gen_path)?;
            let build = gen.build_gen;

            let board = if build.board.is_empty() {
                generator.board.clone()
            } else {
                build.board
            };
            let device = if build.device.is_empty() {
                generator.device.clone()
            } else {
                build.device
            };
            let output_dir = if gen_ref.output.is_empty() {
                generator.output.clone()
            } else {
                gen_ref.output.clone()
            };
            // The idx entry's for-project-part wins; absent that, the
            // processor description supplies the trustzone state or
            // the core name (`Cortex-M4` spelled `CM4`).
            let for_project_part = if !gen_ref.for_project_part.is_empty() {
                gen_ref.for_project_part.clone()
            } else if !build.processor.trustzone.is_empty() {
                build.processor.trustzone.clone()
            } else {
                build.processor.core.replace("Cortex-M", "CM")
            };

            subsystems.push(BuildParameters {
                board: (!board.is_empty()).then_some(board),
                device,
                project_name: if build.project.is_empty() {
                    gen_ref.project.clone()
                } else {
                    build.project
                },
                project_type: generator.project_type,
                for_project_part,
                paired_secure_part: None,
                compiler: build.compiler,
                generator_map: gen_ref.map.clone(),
                output_dir,
                packs: build.packs.into_iter().map(|p| p.pack).collect(),
                cube_context: String::new(),
                cube_context_folder: String::new(),
            });
        }
    }
    Ok(subsystems)
}
