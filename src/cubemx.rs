//! Pipeline orchestration: one pass per declared subsystem, from build
//! description to generated `MX_Device.h` and `*.cgen.yml`.
//!
//! The vendor GUI is an interactive subprocess; the bridge blocks
//! until it exits, then consumes whatever it wrote to disk.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::cbuild::{self, BuildParameters};
use crate::cgen::{self, DiscoveredFiles};
use crate::context;
use crate::error::{Error, Result};
use crate::extract;
use crate::ini::Document;
use crate::ioc::Ioc;
use crate::mx_device;
use crate::mxproject::Mxproject;
use crate::toolchain::{self, Compiler};
use crate::util::{quoted, signal, to_slash};

const CUBE_ENV_VAR: &str = "STM32CubeMX_PATH";
const CUBE_FOLDER: &str = "STM32CubeMX";
const CUBE_IOC: &str = "STM32CubeMX.ioc";

/// What the GUI is started on.
enum LaunchMode<'a> {
    /// Open an existing `.ioc` project.
    Project(&'a Path),
    /// Run a freshly written `project.script` via `-s`.
    Script(&'a Path),
}

fn cubemx_root() -> Result<PathBuf> {
    env::var(CUBE_ENV_VAR).map(PathBuf::from).map_err(|_| {
        Error::VendorLaunchFailed(format!("environment variable {CUBE_ENV_VAR} not set"))
    })
}

fn launch(mode: LaunchMode<'_>) -> Result<()> {
    let root = cubemx_root()?;
    let (java, jar) = if cfg!(windows) {
        (root.join("jre/bin/java.exe"), root.join("STM32CubeMX.exe"))
    } else {
        (root.join("jre/bin/java"), root.join("STM32CubeMX"))
    };

    let mut cmd = Command::new(&java);
    cmd.arg("-jar").arg(&jar);
    match mode {
        LaunchMode::Project(ioc) => {
            cmd.arg(ioc);
        }
        LaunchMode::Script(script) => {
            cmd.arg("-s").arg(script);
        }
    }

    log::info!("launching STM32CubeMX...");
    let status = cmd
        .status()
        .map_err(|e| Error::VendorLaunchFailed(format!("{}: {e}", java.display())))?;
    if !status.success() {
        return Err(Error::VendorLaunchFailed(format!("GUI exited with {status}")));
    }
    Ok(())
}

/// Open the GUI on an existing project, without running the pipeline.
///
/// Accepts either the `.ioc` itself or the `.mxproject` next to it.
pub fn launch_project(input: &Path) -> Result<()> {
    let ioc = if input.extension().is_some_and(|e| e == "ioc") {
        input.to_path_buf()
    } else {
        input.with_file_name(CUBE_IOC)
    };
    if !ioc.is_file() {
        return Err(Error::InputMissing { path: ioc });
    }
    launch(LaunchMode::Project(&ioc))
}

/// Dump the parsed model of a single input file. Debug aid.
pub fn read_input(input: &Path) -> Result<()> {
    if input.extension().is_some_and(|e| e == "ioc") {
        let ioc = Ioc::load(input)?;
        println!("{ioc:#?}");
    } else {
        let doc = Document::load(input)?;
        println!("{doc:#?}");
    }
    Ok(())
}

fn write_project_script(
    workdir: &Path,
    params: &BuildParameters,
    compiler: Compiler,
) -> Result<PathBuf> {
    let path = workdir.join("project.script");
    log::info!("writing CubeMX project script {}", path.display());

    let mut text = String::new();
    match &params.board {
        Some(board) => {
            text.push_str(&format!("loadboard {} allmodes\n", cbuild::unqualified(board)));
        }
        None => {
            text.push_str(&format!("load {}\n", cbuild::device_for_gui(&params.device)));
        }
    }
    text.push_str("project name STM32CubeMX\n");
    text.push_str(&format!(
        "project toolchain {}\n",
        quoted(compiler.project_toolchain())
    ));
    text.push_str(&format!(
        "project path {}\n",
        quoted(&to_slash(&workdir.to_string_lossy()))
    ));
    text.push_str(&format!("SetCopyLibrary {}\n", quoted("copy only")));

    fs::write(&path, text).map_err(|e| Error::io(&path, e))?;
    Ok(path)
}

/// Read a generated C file, degrading to empty content when absent.
/// The extractor then simply finds no regions in it.
fn read_optional(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            log::warn!("cannot read {}, continuing without it: {e}", path.display());
            String::new()
        }
    }
}

/// Paths for the generator layer, relative to `base` where possible.
fn relative_strings(paths: &[PathBuf], base: &Path) -> Vec<String> {
    paths
        .iter()
        .map(|p| {
            let p = p.strip_prefix(base).unwrap_or(p);
            to_slash(&p.to_string_lossy())
        })
        .collect()
}

/// Read the `.mxproject` beside the `.ioc`. Manifest sections are
/// prefixed with the cube context name (`CortexM33S:PreviousGenFiles`),
/// not the output folder name.
fn read_manifest(cube_dir: &Path, params: &BuildParameters) -> Result<Mxproject> {
    Mxproject::read(
        &cube_dir.join(".mxproject"),
        &params.compiler,
        &params.cube_context,
    )
}

fn run_subsystem(params: &BuildParameters) -> Result<()> {
    let compiler: Compiler = params.compiler.parse()?;
    log::info!(
        "processing {} ({}, {compiler})",
        params.project_name,
        cbuild::unqualified(&params.device)
    );

    let workdir = Path::new(&params.output_dir);
    let cube_dir = if workdir.file_name().is_some_and(|n| n == CUBE_FOLDER) {
        workdir.to_path_buf()
    } else {
        workdir.join(CUBE_FOLDER)
    };
    fs::create_dir_all(&cube_dir).map_err(|e| Error::io(&cube_dir, e))?;

    let ioc_path = cube_dir.join(CUBE_IOC);
    if ioc_path.is_file() {
        launch(LaunchMode::Project(&ioc_path))?;
    } else {
        let script = write_project_script(workdir, params, compiler)?;
        launch(LaunchMode::Script(&script))?;
    }

    let ioc = Ioc::load(&ioc_path)?;
    let family = extract::device_family(&ioc)?;
    let main_location = ioc
        .get("ProjectManager", "MainLocation")
        .ok_or_else(|| Error::malformed(&ioc_path, "missing ProjectManager.MainLocation"))?;

    let ctx_folder = params.cube_context_folder.as_str();
    let mut src_dir = cube_dir.clone();
    if !ctx_folder.is_empty() {
        src_dir = src_dir.join(ctx_folder);
    }
    src_dir = src_dir.join(main_location);

    let main_c = read_optional(&src_dir.join("main.c"));
    let msp = read_optional(&src_dir.join(format!("{family}xx_hal_msp.c")));

    let cube_context = (!params.cube_context.is_empty()).then_some(params.cube_context.as_str());
    let peripherals = extract::extract(&ioc, &main_c, &msp, cube_context)?;

    let mut mx_dir = workdir.join("MX_Device");
    if !ctx_folder.is_empty() {
        mx_dir = mx_dir.join(ctx_folder);
    }
    mx_device::write_file(&mx_dir, &peripherals)?;

    let mxproject = read_manifest(&cube_dir, params)?;

    let startup = toolchain::find_startup_files(&cube_dir, compiler, ctx_folder);
    let system = toolchain::find_system_file(&cube_dir, ctx_folder);
    for script in toolchain::find_linker_scripts(&cube_dir, compiler, ctx_folder) {
        log::debug!("linker script: {}", script.display());
    }
    let discovered = DiscoveredFiles {
        startup_files: relative_strings(&startup, workdir),
        system_file: system
            .as_deref()
            .map(|p| relative_strings(&[p.to_path_buf()], workdir).remove(0)),
    };

    let layer = cgen::assemble(params, &mxproject, &discovered);
    cgen::write_file(workdir, &layer)?;
    Ok(())
}

/// Drive the full pipeline for every subsystem the build description
/// declares.
///
/// An unknown compiler or an unresolvable context stops the run; any
/// other per-subsystem failure is reported and the remaining
/// subsystems are still attempted. A `SIGINT` between subsystems stops
/// cleanly.
pub fn process(cbuild_yml: &Path) -> Result<()> {
    let mut subsystems = cbuild::read_idx(cbuild_yml)?;
    context::resolve(&mut subsystems)?;

    let mut first_failure: Option<Error> = None;
    for subsystem in &subsystems {
        if signal::should_abort() {
            log::warn!("abort requested, skipping remaining subsystems");
            break;
        }
        match run_subsystem(subsystem) {
            Ok(()) => {}
            Err(e @ (Error::UnknownCompiler(_) | Error::ContextUnresolved(_))) => {
                return Err(e);
            }
            Err(e) => {
                log::error!("subsystem {} failed: {e}", subsystem.project_name);
                first_failure.get_or_insert(e);
            }
        }
    }
    match first_failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cbuild::ProjectType;

    fn params(dir: &Path) -> BuildParameters {
        BuildParameters {
            board: Some("STMicroelectronics::NUCLEO-F746ZG".to_string()),
            device: "STMicroelectronics::STM32F746ZGTx".to_string(),
            project_name: "blinky".to_string(),
            project_type: ProjectType::SingleCore,
            compiler: "AC6".to_string(),
            output_dir: dir.to_string_lossy().into_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn project_script_content() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_project_script(tmp.path(), &params(tmp.path()), Compiler::Ac6).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "loadboard NUCLEO-F746ZG allmodes");
        assert_eq!(lines[1], "project name STM32CubeMX");
        assert_eq!(lines[2], "project toolchain \"MDK-ARM V5\"");
        assert!(lines[3].starts_with("project path \""));
        assert_eq!(lines[4], "SetCopyLibrary \"copy only\"");
    }

    #[test]
    fn script_loads_device_without_board() {
        let tmp = tempfile::tempdir().unwrap();
        let mut p = params(tmp.path());
        p.board = None;
        p.device = "ST::STM32H745BGTx:CM7".to_string();
        let path = write_project_script(tmp.path(), &p, Compiler::Gcc).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("load STM32H745BGTx\n"));
        assert!(text.contains("project toolchain \"STM32CubeIDE\"\n"));
    }

    #[test]
    fn launch_without_install_root_fails() {
        std::env::remove_var(CUBE_ENV_VAR);
        assert!(matches!(
            launch(LaunchMode::Project(Path::new("x.ioc"))),
            Err(Error::VendorLaunchFailed(_))
        ));
    }

    #[test]
    fn launch_project_requires_existing_ioc() {
        let tmp = tempfile::tempdir().unwrap();
        let mxproject = tmp.path().join(".mxproject");
        std::fs::write(&mxproject, "").unwrap();
        assert!(matches!(
            launch_project(&mxproject),
            Err(Error::InputMissing { .. })
        ));
    }

    #[test]
    fn manifest_sections_keyed_by_cube_context() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(".mxproject"),
            "[CortexM33S:PreviousUsedKeilFiles]\nSourceFiles=..\\Src\\main.c\nCDefines=STM32U585xx\n",
        )
        .unwrap();
        let mut p = params(tmp.path());
        p.cube_context = "CortexM33S".to_string();
        p.cube_context_folder = "Secure".to_string();

        let mx = read_manifest(tmp.path(), &p).unwrap();
        assert_eq!(mx.previous_used_files.source_files, vec!["../Src/main.c"]);
        assert_eq!(mx.previous_used_files.c_defines, vec!["STM32U585xx"]);
    }

    #[test]
    fn relative_paths_for_layer() {
        let base = Path::new("/out");
        let paths = vec![
            PathBuf::from("/out/STM32CubeMX/MDK-ARM/startup_stm32f746xx.s"),
            PathBuf::from("/elsewhere/file.c"),
        ];
        assert_eq!(
            relative_strings(&paths, base),
            vec![
                "STM32CubeMX/MDK-ARM/startup_stm32f746xx.s",
                "/elsewhere/file.c"
            ]
        );
    }
}
