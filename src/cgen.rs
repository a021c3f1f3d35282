//! Assembly of the generator-import layer (`*.cgen.yml`) handed back
//! to the pack-based build.
//!
//! The layer collects what the CubeMX run produced (defines, include
//! paths, generated sources, third-party IP files, discovered startup
//! and system files) after filtering out everything the pack layer
//! already provides on its own.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::cbuild::{self, BuildParameters};
use crate::error::{Error, Result};
use crate::mxproject::Mxproject;
use crate::util::{is_c_identifier, to_slash};

/// Path fragments owned by the pack layer; files and include paths
/// containing one of them must not be duplicated into the layer.
const PATH_FILTERS: [&str; 3] = ["system_", "Templates", "CMSIS/Include"];

#[derive(Debug, Serialize, Default)]
pub struct Cgen {
    #[serde(rename = "generator-import")]
    pub generator_import: GeneratorImport,
}

#[derive(Debug, Serialize, Default)]
pub struct GeneratorImport {
    #[serde(rename = "for-board", skip_serializing_if = "Option::is_none")]
    pub for_board: Option<String>,
    #[serde(rename = "for-device", skip_serializing_if = "Option::is_none")]
    pub for_device: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub packs: Vec<CgenPack>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub define: Vec<String>,
    #[serde(rename = "add-path", skip_serializing_if = "Vec::is_empty")]
    pub add_path: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<CgenGroup>,
}

#[derive(Debug, Serialize, Default)]
pub struct CgenPack {
    pub pack: String,
}

#[derive(Debug, Serialize, Default)]
pub struct CgenGroup {
    pub group: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<CgenFile>,
}

#[derive(Debug, Serialize, Default)]
pub struct CgenFile {
    pub file: String,
}

/// Files found by the toolchain resolver, already stringified.
#[derive(Debug, Default)]
pub struct DiscoveredFiles {
    pub startup_files: Vec<String>,
    pub system_file: Option<String>,
}

fn keep_path(path: &str) -> bool {
    let normalized = to_slash(path);
    !PATH_FILTERS.iter().any(|f| normalized.contains(f))
}

fn files(paths: impl IntoIterator<Item = String>) -> Vec<CgenFile> {
    paths.into_iter().map(|file| CgenFile { file }).collect()
}

/// Build the layer for one subsystem.
pub fn assemble(
    params: &BuildParameters,
    mxproject: &Mxproject,
    discovered: &DiscoveredFiles,
) -> Cgen {
    let used = &mxproject.previous_used_files;

    let define: Vec<String> = used
        .c_defines
        .iter()
        .filter(|d| is_c_identifier(d))
        .cloned()
        .collect();

    let add_path: Vec<String> = used
        .header_paths
        .iter()
        .filter(|p| keep_path(p))
        .cloned()
        .collect();

    let mut cubemx_files: Vec<String> = used
        .source_files
        .iter()
        .filter(|f| keep_path(f))
        .cloned()
        .collect();
    cubemx_files.extend(discovered.startup_files.iter().cloned());
    cubemx_files.extend(discovered.system_file.iter().cloned());

    let mut groups = vec![CgenGroup {
        group: "CubeMX".to_string(),
        files: files(cubemx_files),
    }];
    for ip in &mxproject.third_party_ips {
        let mut ip_files: Vec<String> = Vec::new();
        for file in ip
            .include_files
            .iter()
            .chain(&ip.source_files)
            .chain(&ip.source_asm_files)
        {
            if !ip_files.contains(file) {
                ip_files.push(file.clone());
            }
        }
        groups.push(CgenGroup {
            group: ip.name.clone(),
            files: files(ip_files),
        });
    }
    // A non-secure part links against the secure sibling's gateway
    // import library.
    if let Some(secure) = &params.paired_secure_part {
        groups.push(CgenGroup {
            group: "CMSE Library".to_string(),
            files: vec![CgenFile {
                file: format!("$cmse-lib({secure})$"),
            }],
        });
    }

    Cgen {
        generator_import: GeneratorImport {
            for_board: params
                .board
                .as_deref()
                .map(|b| cbuild::unqualified(b).to_string()),
            for_device: Some(cbuild::unqualified(&params.device).to_string()),
            packs: params
                .packs
                .iter()
                .map(|p| CgenPack { pack: p.clone() })
                .collect(),
            define,
            add_path,
            groups,
        },
    }
}

/// Serialize the layer to `STM32CubeMX.cgen.yml` under `dir`.
pub fn write_file(dir: &Path, cgen: &Cgen) -> Result<std::path::PathBuf> {
    let path = dir.join("STM32CubeMX.cgen.yml");
    let text = serde_yaml::to_string(cgen).map_err(|e| Error::malformed(&path, e.to_string()))?;
    fs::write(&path, text).map_err(|e| Error::io(&path, e))?;
    log::info!("generated {}", path.display());
    Ok(path)
}
