//! Serialization of extracted peripheral specs into `MX_Device.h`.
//!
//! The layout is fixed: banner comment, include guard, one block per
//! peripheral, closing `#endif`. Output is a pure function of the
//! extractor result except for the timestamp line in the banner.

use std::fs;
use std::path::Path;

use chrono::Local;

use crate::error::{Error, Result};
use crate::extract::PeripheralSpec;

const FILE_NAME: &str = "MX_Device.h";

/// Characters that never survive into a `#define` name or value.
const INVALID_CHARS: [char; 9] = ['=', ' ', '/', '(', ')', '[', ']', '\\', '-'];

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if INVALID_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// `#define MX_<name> <value>` with the name left-padded to 39 columns
/// so values align. Empty values produce no line.
fn define(name: &str, value: &str) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    let name = format!("MX_{}", sanitize(name));
    Some(format!("#define {:<39}{}\n", name, sanitize(value)))
}

fn push_define(out: &mut String, name: &str, value: &str) {
    if let Some(line) = define(name, value) {
        out.push_str(&line);
    }
}

fn header(out: &mut String) {
    let now = Local::now().format("%d/%m/%Y %H:%M:%S");
    out.push_str(
        "/******************************************************************************\n",
    );
    out.push_str(&format!(" * File Name   : {FILE_NAME}\n"));
    out.push_str(&format!(" * Date        : {now}\n"));
    out.push_str(" * Description : STM32Cube MX parameter definitions\n");
    out.push_str(" * Note        : This file is generated with a generator out of the\n");
    out.push_str(" *               STM32CubeMX project and its generated files (DO NOT EDIT!)\n");
    out.push_str(
        " ******************************************************************************/\n\n",
    );
    out.push_str("#ifndef __MX_DEVICE_H\n");
    out.push_str("#define __MX_DEVICE_H\n\n");
}

fn peripheral_block(out: &mut String, spec: &PeripheralSpec) {
    // 50-column banner; the pad width includes the leading newline.
    let mut banner = format!("\n/*------------------------------ {}", spec.name);
    if banner.len() < 49 {
        banner.push_str(&" ".repeat(49 - banner.len()));
    }
    banner.push_str("-----------------------------*/\n");
    out.push_str(&banner);

    push_define(out, &spec.name, "1");
    out.push('\n');

    for (item, value) in &spec.i2c_info {
        push_define(out, &format!("{}_{item}", spec.name), value);
    }

    if let Some(vmode) = &spec.virtual_mode {
        out.push_str("/* Virtual mode */\n");
        push_define(out, &format!("{}_VM", spec.name), vmode);
        push_define(out, &format!("{}_{vmode}", spec.name), "1");
    }

    if !spec.pins.is_empty() {
        out.push_str("/* Pins */\n");
        for (signal, pin) in &spec.pins {
            out.push_str(&format!("\n/* {signal} */\n"));
            push_define(out, &format!("{signal}_Pin"), &pin.p);
            push_define(out, &format!("{signal}_GPIO_Pin"), &pin.pin);
            push_define(out, &format!("{signal}_GPIOx"), &pin.port);
            push_define(out, &format!("{signal}_GPIO_Mode"), &pin.mode);
            push_define(out, &format!("{signal}_GPIO_PuPd"), &pin.pull);
            push_define(out, &format!("{signal}_GPIO_Speed"), &pin.speed);
            push_define(out, &format!("{signal}_GPIO_AF"), &pin.alternate);
        }
    }
}

/// Render the complete header text, peripherals in extractor order.
pub fn render(peripherals: &[PeripheralSpec]) -> String {
    let mut out = String::new();
    header(&mut out);
    for spec in peripherals {
        peripheral_block(&mut out, spec);
    }
    out.push_str("\n#endif  /* __MX_DEVICE_H */\n");
    out
}

/// Write (overwrite) `MX_Device.h` under `dir`, creating the directory
/// tree as needed.
pub fn write_file(dir: &Path, peripherals: &[PeripheralSpec]) -> Result<std::path::PathBuf> {
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    let path = dir.join(FILE_NAME);
    fs::write(&path, render(peripherals)).map_err(|e| Error::io(&path, e))?;
    log::info!("generated {}", path.display());
    Ok(path)
}
