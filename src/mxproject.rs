//! Typed reader for the `.mxproject` manifest STM32CubeMX writes after
//! code generation.
//!
//! Sections are prefixed with `<context>:` in multi-context projects
//! (`[CM4:PreviousUsedKeilFiles]`); single-context projects use the
//! bare names. Which file-list section applies depends on the
//! compiler: Keil lists for AC6/CLANG, CubeIDE lists for GCC/IAR.

use std::path::Path;

use crate::error::Result;
use crate::ini::Document;
use crate::toolchain::Compiler;
use crate::util::to_slash;

#[derive(Debug, Clone, Default)]
pub struct PreviousLibFiles {
    pub lib_files: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PreviousUsedFiles {
    pub source_files: Vec<String>,
    pub header_paths: Vec<String>,
    pub c_defines: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PreviousGenFiles {
    pub advanced_folder_structure: String,
    pub header_files_list: Vec<String>,
    pub header_path_list: Vec<String>,
    pub header_files: String,
    pub source_files_list: Vec<String>,
    pub source_path_list: Vec<String>,
    pub source_files: String,
}

#[derive(Debug, Clone, Default)]
pub struct ThirdPartyIp {
    pub name: String,
    pub include_files: Vec<String>,
    pub source_files: Vec<String>,
    pub source_asm_files: Vec<String>,
}

/// The manifest contents relevant to one build context.
#[derive(Debug, Clone, Default)]
pub struct Mxproject {
    pub context: String,
    pub previous_lib_files: PreviousLibFiles,
    pub previous_used_files: PreviousUsedFiles,
    pub previous_gen_files: PreviousGenFiles,
    pub third_party_ips: Vec<ThirdPartyIp>,
}

/// Append `value` if non-empty and not already stored, slashes
/// normalized. The manifest repeats entries across lists.
fn store(dest: &mut Vec<String>, value: &str) {
    let value = to_slash(value.trim());
    if value.is_empty() || dest.contains(&value) {
        return;
    }
    dest.push(value);
}

fn store_csv(dest: &mut Vec<String>, doc: &Document, section: &str, key: &str) {
    for item in doc.csv(section, key) {
        store(dest, item);
    }
}

/// Read `<prefix>#0 .. <prefix>#(size-1)` where the scalar at
/// `size_key` gives the upper bound. Missing intermediates are empty
/// and therefore skipped.
fn store_iterated(dest: &mut Vec<String>, doc: &Document, section: &str, size_key: &str, prefix: &str) {
    let count: usize = doc.value(section, size_key).parse().unwrap_or(0);
    for i in 0..count {
        store(dest, doc.value(section, &format!("{prefix}#{i}")));
    }
}

fn section_name(context: &str, name: &str) -> String {
    if context.is_empty() {
        name.to_string()
    } else {
        format!("{context}:{name}")
    }
}

impl Mxproject {
    /// Parse the manifest at `path` for one context.
    ///
    /// An unknown compiler tag is the only hard error. An absent or
    /// unreadable manifest yields an empty `Mxproject`; the downstream
    /// pipeline tolerates that.
    pub fn read(path: &Path, compiler: &str, context: &str) -> Result<Self> {
        let compiler: Compiler = compiler.parse()?;

        let mut mxproject = Mxproject {
            context: context.to_string(),
            ..Default::default()
        };

        let doc = match Document::load(path) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("no usable .mxproject, continuing with empty manifest: {e}");
                return Ok(mxproject);
            }
        };
        log::info!("reading CubeMX manifest: {}", path.display());

        mxproject.read_used_files(&doc, compiler, context);
        mxproject.read_lib_files(&doc, context);
        mxproject.read_gen_files(&doc, context);
        mxproject.read_third_party_ips(&doc, context);

        Ok(mxproject)
    }

    fn read_used_files(&mut self, doc: &Document, compiler: Compiler, context: &str) {
        let id = if compiler.uses_keil_manifest() {
            "PreviousUsedKeilFiles"
        } else {
            "PreviousUsedCubeIDEFiles"
        };
        let section = section_name(context, id);
        let used = &mut self.previous_used_files;
        store_csv(&mut used.source_files, doc, &section, "SourceFiles");
        store_csv(&mut used.header_paths, doc, &section, "HeaderPath");
        store_csv(&mut used.c_defines, doc, &section, "CDefines");
    }

    fn read_lib_files(&mut self, doc: &Document, context: &str) {
        let section = section_name(context, "PreviousLibFiles");
        store_csv(&mut self.previous_lib_files.lib_files, doc, &section, "LibFiles");
    }

    fn read_gen_files(&mut self, doc: &Document, context: &str) {
        let section = section_name(context, "PreviousGenFiles");
        let gen = &mut self.previous_gen_files;
        gen.advanced_folder_structure = doc.value(&section, "AdvancedFolderStructure").to_string();
        store_iterated(&mut gen.header_files_list, doc, &section, "HeaderFileListSize", "HeaderFiles");
        store_iterated(&mut gen.header_path_list, doc, &section, "HeaderFolderListSize", "HeaderPath");
        gen.header_files = doc.value(&section, "HeaderFiles").to_string();
        store_iterated(&mut gen.source_files_list, doc, &section, "SourceFileListSize", "SourceFiles");
        store_iterated(&mut gen.source_path_list, doc, &section, "SourceFolderListSize", "SourcePath");
        gen.source_files = doc.value(&section, "SourceFiles").to_string();
    }

    fn read_third_party_ips(&mut self, doc: &Document, context: &str) {
        let section = section_name(context, "ThirdPartyIp");
        let count: usize = doc.value(&section, "ThirdPartyIpNumber").parse().unwrap_or(0);
        for i in 0..count {
            let name = doc.value(&section, &format!("ThirdPartyIpName#{i}"));
            if name.is_empty() {
                continue;
            }
            let ip_section = section_name(context, &format!("ThirdPartyIp#{name}"));
            let mut ip = ThirdPartyIp {
                name: name.to_string(),
                ..Default::default()
            };
            store_csv(&mut ip.include_files, doc, &ip_section, "include");
            store_csv(&mut ip.source_files, doc, &ip_section, "source");
            store_csv(&mut ip.source_asm_files, doc, &ip_section, "sourceAsm");
            self.third_party_ips.push(ip);
        }
    }
}
