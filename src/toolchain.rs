//! Compiler-to-toolchain mapping and discovery of the toolchain files
//! STM32CubeMX drops on disk (startup assembly, system source, linker
//! scripts).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Supported compiler tags of the build description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compiler {
    Ac6,
    Gcc,
    Iar,
    Clang,
}

impl FromStr for Compiler {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "AC6" => Compiler::Ac6,
            "GCC" => Compiler::Gcc,
            "IAR" => Compiler::Iar,
            "CLANG" => Compiler::Clang,
            _ => return Err(Error::UnknownCompiler(s.to_string())),
        })
    }
}

impl fmt::Display for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Compiler::Ac6 => "AC6",
            Compiler::Gcc => "GCC",
            Compiler::Iar => "IAR",
            Compiler::Clang => "CLANG",
        })
    }
}

impl Compiler {
    /// Folder STM32CubeMX generates toolchain files into.
    pub fn toolchain_folder(&self) -> &'static str {
        match self {
            Compiler::Ac6 => "MDK-ARM",
            Compiler::Gcc | Compiler::Clang => "STM32CubeIDE",
            Compiler::Iar => "EWARM",
        }
    }

    /// Toolchain name for the `project toolchain` script command.
    pub fn project_toolchain(&self) -> &'static str {
        match self {
            Compiler::Ac6 | Compiler::Clang => "MDK-ARM V5",
            Compiler::Gcc => "STM32CubeIDE",
            Compiler::Iar => "EWARM",
        }
    }

    pub fn linker_extension(&self) -> &'static str {
        match self {
            Compiler::Ac6 => ".sct",
            Compiler::Gcc | Compiler::Clang => ".ld",
            Compiler::Iar => ".icf",
        }
    }

    /// The `.mxproject` section this compiler's file lists live in:
    /// `PreviousUsedKeilFiles` for AC6/CLANG, `PreviousUsedCubeIDEFiles`
    /// for GCC/IAR.
    pub fn uses_keil_manifest(&self) -> bool {
        matches!(self, Compiler::Ac6 | Compiler::Clang)
    }

    /// Directory searched for `startup_*.s` files.
    ///
    /// For STM32CubeIDE the per-context folder sits between the
    /// toolchain folder and the application tree; single-context
    /// projects have no such segment.
    pub fn startup_search_dir(&self, root: &Path, ctx_folder: &str) -> PathBuf {
        match self {
            Compiler::Ac6 => root.join("MDK-ARM"),
            Compiler::Iar => root.join("EWARM"),
            Compiler::Gcc | Compiler::Clang => {
                let mut dir = root.join("STM32CubeIDE");
                if !ctx_folder.is_empty() {
                    dir = dir.join(ctx_folder);
                }
                dir.join("Application").join("Startup")
            }
        }
    }
}

fn glob_sorted(pattern: &str) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = match glob::glob(pattern) {
        Ok(paths) => paths.filter_map(|p| p.ok()).collect(),
        Err(e) => {
            log::debug!("bad glob pattern {pattern}: {e}");
            Vec::new()
        }
    };
    found.sort();
    found
}

/// All `startup_*.s` files of the toolchain folder, sorted.
pub fn find_startup_files(root: &Path, compiler: Compiler, ctx_folder: &str) -> Vec<PathBuf> {
    let dir = compiler.startup_search_dir(root, ctx_folder);
    let pattern = format!("{}/startup_*.s", dir.display());
    let found = glob_sorted(&pattern);
    log::debug!("startup files under {}: {}", dir.display(), found.len());
    found
}

/// The `system_*.c` file generated for the current context.
///
/// CubeMX places it under `<ctxFolder>/Src` in multi-context projects,
/// under `Common` when shared between contexts, or under the project
/// root `Src` otherwise; the most specific hit wins.
pub fn find_system_file(root: &Path, ctx_folder: &str) -> Option<PathBuf> {
    let pattern = format!("{}/**/system_*.c", root.display());
    let candidates = glob_sorted(&pattern);

    let rank = |p: &Path| -> u32 {
        let s = crate::util::to_slash(&p.to_string_lossy());
        if !ctx_folder.is_empty() && s.contains(&format!("{ctx_folder}/Src")) {
            3
        } else if s.contains("Common/") {
            2
        } else {
            1
        }
    };
    candidates.into_iter().max_by_key(|p| rank(p))
}

/// Linker scripts with the compiler's extension under its toolchain
/// folder, sorted. Discovery only; their content is not interpreted.
pub fn find_linker_scripts(root: &Path, compiler: Compiler, ctx_folder: &str) -> Vec<PathBuf> {
    let dir = compiler.startup_search_dir(root, ctx_folder);
    let pattern = format!("{}/**/*{}", dir.display(), compiler.linker_extension());
    glob_sorted(&pattern)
}
