//! Mapping of declared subsystems onto STM32CubeMX context identifiers
//! and output folder names.
//!
//! CubeMX names its per-core build contexts after the processor
//! (`CortexM4`, `CortexM33S`, ...) and keeps their generated trees in
//! short folder names (`CM4`, `Secure`, ...). Bootloader/application
//! splits instead carry a free-form generator map tag (`Appli`,
//! `Boot`, `FSBL`, ...) that is used verbatim for both.

use crate::cbuild::{BuildParameters, ProjectType};
use crate::error::{Error, Result};

fn core_context(part: &str) -> Option<(&'static str, &'static str)> {
    match part {
        "CM0P" | "CM0+" | "CM0PLUS" => Some(("CortexM0Plus", "CM0PLUS")),
        "CM4" => Some(("CortexM4", "CM4")),
        "CM7" => Some(("CortexM7", "CM7")),
        _ => None,
    }
}

/// Fill in `cube_context` / `cube_context_folder` for every subsystem
/// and pair non-secure parts with their secure sibling.
///
/// Idempotent: resolving an already resolved slice recomputes the same
/// values.
pub fn resolve(subsystems: &mut [BuildParameters]) -> Result<()> {
    // The secure sibling's project name, for pairing below.
    let secure_project = subsystems
        .iter()
        .find(|s| s.project_type == ProjectType::TrustZone && s.for_project_part == "secure")
        .map(|s| s.project_name.clone());

    for subsystem in subsystems.iter_mut() {
        if !subsystem.generator_map.is_empty() {
            subsystem.cube_context = subsystem.generator_map.clone();
            subsystem.cube_context_folder = subsystem.generator_map.clone();
            continue;
        }
        match subsystem.project_type {
            ProjectType::TrustZone => match subsystem.for_project_part.as_str() {
                "secure" => {
                    subsystem.cube_context = "CortexM33S".into();
                    subsystem.cube_context_folder = "Secure".into();
                }
                "non-secure" => {
                    subsystem.cube_context = "CortexM33NS".into();
                    subsystem.cube_context_folder = "NonSecure".into();
                    subsystem.paired_secure_part = secure_project.clone();
                }
                other => {
                    return Err(Error::ContextUnresolved(format!(
                        "trustzone project part '{other}' of {}",
                        subsystem.project_name
                    )));
                }
            },
            ProjectType::MultiCore => {
                let Some((context, folder)) = core_context(&subsystem.for_project_part) else {
                    return Err(Error::ContextUnresolved(format!(
                        "multi-core project part '{}' of {}",
                        subsystem.for_project_part, subsystem.project_name
                    )));
                };
                subsystem.cube_context = context.into();
                subsystem.cube_context_folder = folder.into();
            }
            ProjectType::SingleCore => {
                subsystem.cube_context = String::new();
                subsystem.cube_context_folder = String::new();
            }
        }
        log::debug!(
            "resolved {}: context '{}', folder '{}'",
            subsystem.project_name,
            subsystem.cube_context,
            subsystem.cube_context_folder
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subsystem(project: &str, ptype: ProjectType, part: &str) -> BuildParameters {
        BuildParameters {
            project_name: project.to_string(),
            project_type: ptype,
            for_project_part: part.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn trustzone_pairing() {
        let mut subs = vec![
            subsystem("projA", ProjectType::TrustZone, "secure"),
            subsystem("projB", ProjectType::TrustZone, "non-secure"),
        ];
        resolve(&mut subs).unwrap();
        assert_eq!(subs[0].cube_context, "CortexM33S");
        assert_eq!(subs[0].cube_context_folder, "Secure");
        assert_eq!(subs[1].cube_context, "CortexM33NS");
        assert_eq!(subs[1].cube_context_folder, "NonSecure");
        assert_eq!(subs[1].paired_secure_part.as_deref(), Some("projA"));
        assert_eq!(subs[0].paired_secure_part, None);
    }

    #[test]
    fn multi_core_parts() {
        let mut subs = vec![
            subsystem("cm7app", ProjectType::MultiCore, "CM7"),
            subsystem("cm4app", ProjectType::MultiCore, "CM4"),
        ];
        resolve(&mut subs).unwrap();
        assert_eq!(subs[0].cube_context, "CortexM7");
        assert_eq!(subs[0].cube_context_folder, "CM7");
        assert_eq!(subs[1].cube_context, "CortexM4");
        assert_eq!(subs[1].cube_context_folder, "CM4");

        let mut cm0 = vec![subsystem("boot", ProjectType::MultiCore, "CM0P")];
        resolve(&mut cm0).unwrap();
        assert_eq!(cm0[0].cube_context, "CortexM0Plus");
        assert_eq!(cm0[0].cube_context_folder, "CM0PLUS");
    }

    #[test]
    fn generator_map_wins() {
        let mut subs = vec![subsystem("boot", ProjectType::TrustZone, "secure")];
        subs[0].generator_map = "AppliSecure".to_string();
        resolve(&mut subs).unwrap();
        assert_eq!(subs[0].cube_context, "AppliSecure");
        assert_eq!(subs[0].cube_context_folder, "AppliSecure");
    }

    #[test]
    fn single_core_is_contextless() {
        let mut subs = vec![subsystem("app", ProjectType::SingleCore, "")];
        resolve(&mut subs).unwrap();
        assert_eq!(subs[0].cube_context, "");
        assert_eq!(subs[0].cube_context_folder, "");
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut subs = vec![
            subsystem("projA", ProjectType::TrustZone, "secure"),
            subsystem("projB", ProjectType::TrustZone, "non-secure"),
        ];
        resolve(&mut subs).unwrap();
        let first = format!("{subs:?}");
        resolve(&mut subs).unwrap();
        assert_eq!(first, format!("{subs:?}"));
    }

    #[test]
    fn unknown_core_is_unresolved() {
        let mut subs = vec![subsystem("x", ProjectType::MultiCore, "CM55")];
        assert!(matches!(
            resolve(&mut subs),
            Err(Error::ContextUnresolved(_))
        ));
    }
}
