//! Device configuration extraction.
//!
//! Correlates three loosely coupled artifacts of a CubeMX run: the
//! `.ioc` map names the peripherals and pins, `main.c` holds the I2C
//! filter configuration calls, and the HAL MSP file holds the
//! authoritative GPIO initialization per peripheral instance. The
//! result is one [`PeripheralSpec`] per selected peripheral.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::ioc::Ioc;
use crate::util::digits_at_end;

/// Peripheral classes exported into `MX_Device.h`.
const IP_PREFIXES: [&str; 11] = [
    "USART", "UART", "LPUART", "SPI", "I2C", "ETH", "SDMMC", "CAN", "USB", "SDIO", "FDCAN",
];

/// Pin configuration as spelled in the HAL MSP source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinDefinition {
    /// Vendor pin label, e.g. `PB8`.
    pub p: String,
    /// HAL pin macro, e.g. `GPIO_PIN_8`.
    pub pin: String,
    /// HAL port macro, e.g. `GPIOB`.
    pub port: String,
    pub mode: String,
    pub pull: String,
    pub speed: String,
    pub alternate: String,
}

/// One peripheral with its virtual mode, I2C filter settings and pins,
/// keyed (and thereby sorted) by signal name.
#[derive(Debug, Clone, Default)]
pub struct PeripheralSpec {
    pub name: String,
    pub virtual_mode: Option<String>,
    /// `ANF_ENABLE` / `DNF` entries, present only for I2C instances.
    pub i2c_info: IndexMap<String, String>,
    pub pins: BTreeMap<String, PinDefinition>,
}

/// `Mcu.Context<N>` values ordered by their numeric suffix.
pub fn contexts(ioc: &Ioc) -> Vec<String> {
    let Some(mcu) = ioc.section("Mcu") else {
        return Vec::new();
    };
    let mut found: Vec<(u32, String)> = mcu
        .iter()
        .filter(|(key, _)| {
            key.starts_with("Context") && key.ends_with(|c: char| c.is_ascii_digit())
        })
        .filter_map(|(key, value)| {
            digits_at_end(key)
                .parse()
                .ok()
                .map(|n| (n, value.clone()))
        })
        .collect();
    found.sort();
    found.into_iter().map(|(_, ctx)| ctx).collect()
}

/// `Mcu.Family`; must name an STM32 family.
pub fn device_family(ioc: &Ioc) -> Result<String> {
    let family = ioc.get("Mcu", "Family").unwrap_or("");
    if family.starts_with("STM32") {
        Ok(family.to_string())
    } else {
        Err(Error::malformed(ioc.origin(), "missing device family"))
    }
}

/// Whether `peripheral` appears as a token in a context's `IPs` line
/// (`CORTEX_M4:I,UART5:I,...`).
fn in_ips_line(ips: &str, peripheral: &str) -> bool {
    ips.split(',')
        .any(|token| token.split(':').next() == Some(peripheral))
}

/// The selected peripheral instances, alphabetically ordered.
///
/// `Mcu.IP<i>` entries are kept when they start with one of the known
/// peripheral class prefixes and, when a context is given, appear in
/// that context's `IPs` line.
pub fn peripherals(ioc: &Ioc, context: Option<&str>) -> Result<Vec<String>> {
    let Some(mcu) = ioc.section("Mcu") else {
        return Err(Error::malformed(ioc.origin(), "missing Mcu section"));
    };

    let ips_line = match context {
        None => None,
        Some(ctx) => {
            let Some(ips) = ioc.get(ctx, "IPs") else {
                return Err(Error::ContextUnresolved(format!(
                    "context '{ctx}' has no IPs line in {}",
                    ioc.origin().display()
                )));
            };
            Some(ips)
        }
    };

    let mut selected: Vec<String> = mcu
        .iter()
        .filter(|(key, _)| {
            key.strip_prefix("IP")
                .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
        })
        .map(|(_, instance)| instance.as_str())
        .filter(|instance| IP_PREFIXES.iter().any(|prefix| instance.starts_with(prefix)))
        .filter(|instance| ips_line.map_or(true, |ips| in_ips_line(ips, instance)))
        .map(str::to_string)
        .collect();
    selected.sort();
    selected.dedup();
    Ok(selected)
}

/// The peripheral's `VirtualMode*` value, if any. With several such
/// keys the lexicographically first key wins.
pub fn virtual_mode(ioc: &Ioc, peripheral: &str) -> Option<String> {
    let section = ioc.section(peripheral)?;
    let mut keys: Vec<&String> = section
        .keys()
        .filter(|k| k.starts_with("VirtualMode"))
        .collect();
    keys.sort();
    keys.first().map(|k| section[*k].clone())
}

/// Scan `main.c` for the `MX_<P>_Init` body and pull the analog/digital
/// filter arguments out of the `HAL_I2CEx_Config*Filter` calls.
pub fn i2c_filters(main_c: &str, peripheral: &str) -> IndexMap<String, String> {
    let mut filters = IndexMap::new();
    let header = format!("static void MX_{peripheral}_Init");
    let mut inside = false;
    for line in main_c.lines() {
        if !inside {
            inside = line.starts_with(&header);
            continue;
        }
        if line.starts_with('}') {
            break;
        }
        if line.contains("HAL_I2CEx_ConfigAnalogFilter") {
            let enabled = line.contains("I2C_ANALOGFILTER_ENABLE");
            filters.insert(
                "ANF_ENABLE".to_string(),
                if enabled { "1" } else { "0" }.to_string(),
            );
        }
        if let Some(idx) = line.find("HAL_I2CEx_ConfigDigitalFilter") {
            let args = line[idx..]
                .split_once('(')
                .map(|(_, rest)| rest)
                .unwrap_or("");
            if let Some(dnf) = args.split(')').next().and_then(|a| a.split(',').nth(1)) {
                filters.insert("DNF".to_string(), dnf.trim().to_string());
            }
        }
    }
    filters
}

const LABEL_SPECIALS: [char; 31] = [
    '!', '@', '#', '$', '%', '^', '&', '*', '(', '+', '=', '-', '_', '[', ']', '{', '}', ';', ':',
    ',', '.', '?', '/', '\\', '|', '~', '`', '"', '\'', '<', '>',
];

/// First word of a `GPIO_Label`, special characters flattened to `_`.
fn sanitize_label(label: &str) -> String {
    let word = label.split_whitespace().next().unwrap_or("");
    word.chars()
        .map(|c| {
            if LABEL_SPECIALS.contains(&c) || c == ' ' {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Recover the bare `P<port><num>` label from an IOC pin key like
/// `PB8`, `PC12-OSC32`, `PA11 (PA9)` or `PH0\ (PH0-OSC_IN)`.
fn clean_pin_id(key: &str) -> &str {
    key.split(['\\', '(', ' ', '_', '-'])
        .next()
        .unwrap_or(key)
}

/// IOC sections carrying one of the peripheral's signals:
/// `(signal, pin key, sanitized label)`.
fn collect_pins(ioc: &Ioc, peripheral: &str) -> Vec<(String, String, String)> {
    let mut pins = Vec::new();
    for key in ioc.section_names() {
        if key.starts_with("VP") {
            continue;
        }
        let Some(signal) = ioc.get(key, "Signal") else {
            continue;
        };
        if !signal.starts_with(peripheral) {
            continue;
        }
        let label = ioc
            .get(key, "GPIO_Label")
            .map(sanitize_label)
            .unwrap_or_default();
        pins.push((signal.to_string(), key.to_string(), label));
    }
    pins
}

/// Scanner state for MSP instance regions: a region opens on the
/// `->Instance==<P>` comparison of the peripheral's MspInit and closes
/// at the next `}` in column 0.
enum Region {
    Outside,
    Inside,
}

/// Walk the MSP source for the peripheral's init region and extract the
/// GPIO configuration that applies to `pin`.
///
/// Assignments to `X.Pin/.Port/.Mode/.Pull/.Speed/.Alternate` build up
/// a candidate; the `HAL_GPIO_Init` call that mentions the pin's port
/// (or its label's `_GPIO_Port` alias) and whose accumulated `Pin`
/// mask contains the pin finalizes it. A region that closes without
/// finalizing yields `None`.
fn pin_configuration(
    msp: &str,
    peripheral: &str,
    pin: &str,
    label: &str,
) -> Option<PinDefinition> {
    let pin_num = digits_at_end(pin);
    if pin_num.is_empty() || !pin.starts_with('P') {
        return None;
    }
    let gpio_pin = format!("GPIO_PIN_{pin_num}");
    let gpio_port = format!("GPIO{}", &pin[1..pin.len() - pin_num.len()]);
    let label_port = format!("{label}_GPIO_Port");
    let label_pin = format!("{label}_Pin");

    let mut region = Region::Outside;
    let mut info = PinDefinition::default();
    // Multi-line `X.Pin = A | B | C;` accumulation.
    let mut pending: Option<String> = None;

    for line in msp.lines() {
        if line.starts_with('}') {
            region = Region::Outside;
        }
        if line.contains("->Instance==") && line.contains(peripheral) {
            region = Region::Inside;
        }
        if let Region::Outside = region {
            continue;
        }

        if line.contains("HAL_GPIO_Init")
            && (line.contains(&gpio_port) || (!label.is_empty() && line.contains(&label_port)))
        {
            let hit = info
                .pin
                .split('|')
                .map(str::trim)
                .any(|val| val == gpio_pin || (!label.is_empty() && val == label_pin));
            if hit {
                info.p = pin.to_string();
                info.pin = gpio_pin;
                info.port = gpio_port;
                return Some(info);
            }
        }

        if let Some(acc) = pending.as_mut() {
            acc.push_str(line.trim_start());
            if acc.contains(';') {
                info.pin = acc.split(';').next().unwrap_or("").to_string();
                pending = None;
            }
            continue;
        }

        let Some((left, right)) = line.split_once('=') else {
            continue;
        };
        let value = right.trim_start();
        let scalar = |v: &str| v.split(';').next().unwrap_or("").to_string();
        if left.contains(".Pin") {
            if value.contains(';') {
                info.pin = scalar(value);
            } else {
                pending = Some(value.to_string());
            }
        } else if left.contains(".Port") {
            info.port = scalar(value);
        } else if left.contains(".Mode") {
            info.mode = scalar(value);
        } else if left.contains(".Pull") {
            info.pull = scalar(value);
        } else if left.contains(".Speed") {
            info.speed = scalar(value);
        } else if left.contains(".Alternate") {
            info.alternate = scalar(value);
        }
    }
    None
}

/// Run the full extraction for one context (or none).
pub fn extract(
    ioc: &Ioc,
    main_c: &str,
    msp: &str,
    context: Option<&str>,
) -> Result<Vec<PeripheralSpec>> {
    let mut specs = Vec::new();
    for name in peripherals(ioc, context)? {
        let mut spec = PeripheralSpec {
            name: name.clone(),
            virtual_mode: virtual_mode(ioc, &name),
            ..Default::default()
        };
        if name.starts_with("I2C") {
            spec.i2c_info = i2c_filters(main_c, &name);
        }
        for (signal, key, label) in collect_pins(ioc, &name) {
            let pin_id = clean_pin_id(&key);
            if let Some(def) = pin_configuration(msp, &name, pin_id, &label) {
                spec.pins.insert(signal, def);
            } else {
                log::debug!("no MSP configuration found for {signal} ({key})");
            }
        }
        log::debug!("extracted {}: {} pin(s)", spec.name, spec.pins.len());
        specs.push(spec);
    }
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIN_C: &str = "\
static void MX_I2C1_Init(void)
{
  hi2c1.Instance = I2C1;
  if (HAL_I2CEx_ConfigAnalogFilter(&hi2c1, I2C_ANALOGFILTER_ENABLE) != HAL_OK)
  {
    Error_Handler();
  }
  if (HAL_I2CEx_ConfigDigitalFilter(&hi2c1, 3) != HAL_OK)
  {
    Error_Handler();
  }
}
";

    const MSP_C: &str = "\
void HAL_I2C_MspInit(I2C_HandleTypeDef* hi2c)
{
  GPIO_InitTypeDef GPIO_InitStruct = {0};
  if(hi2c->Instance==I2C1)
  {
    GPIO_InitStruct.Pin = GPIO_PIN_8;
    GPIO_InitStruct.Port = GPIOB;
    GPIO_InitStruct.Mode = GPIO_MODE_AF_OD;
    GPIO_InitStruct.Pull = GPIO_NOPULL;
    GPIO_InitStruct.Speed = GPIO_SPEED_FREQ_LOW;
    GPIO_InitStruct.Alternate = GPIO_AF4_I2C1;
    HAL_GPIO_Init(GPIOB, &GPIO_InitStruct);
  }
}
";

    fn i2c_ioc() -> Ioc {
        Ioc::parse(
            "Mcu.Family=STM32F4\nMcu.IP1=I2C1\nMcu.ContextNumberOfCores=1\nPB8.Signal=I2C1_SCL\nPB8.GPIO_Label=SCL\n",
        )
    }

    #[test]
    fn single_core_i2c_with_pin() {
        let specs = extract(&i2c_ioc(), MAIN_C, MSP_C, None).unwrap();
        assert_eq!(specs.len(), 1);
        let i2c = &specs[0];
        assert_eq!(i2c.name, "I2C1");
        assert_eq!(i2c.i2c_info.get("ANF_ENABLE").map(String::as_str), Some("1"));
        assert_eq!(i2c.i2c_info.get("DNF").map(String::as_str), Some("3"));
        let pin = &i2c.pins["I2C1_SCL"];
        assert_eq!(
            pin,
            &PinDefinition {
                p: "PB8".into(),
                pin: "GPIO_PIN_8".into(),
                port: "GPIOB".into(),
                mode: "GPIO_MODE_AF_OD".into(),
                pull: "GPIO_NOPULL".into(),
                speed: "GPIO_SPEED_FREQ_LOW".into(),
                alternate: "GPIO_AF4_I2C1".into(),
            }
        );
    }

    #[test]
    fn pin_macros_follow_label() {
        let specs = extract(&i2c_ioc(), MAIN_C, MSP_C, None).unwrap();
        for spec in &specs {
            for def in spec.pins.values() {
                assert_eq!(def.pin, format!("GPIO_PIN_{}", digits_at_end(&def.p)));
                assert_eq!(def.port, format!("GPIO{}", &def.p[1..2]));
            }
        }
    }

    #[test]
    fn context_filters_peripherals() {
        let ioc = Ioc::parse(
            "Mcu.Context1=CortexM4\nMcu.Context2=CortexM7\nMcu.IP1=UART5\nMcu.IP2=SPI2\nCortexM4.IPs=CORTEX_M4:I,UART5:I,USB_DEVICE_M4:I\n",
        );
        assert_eq!(contexts(&ioc), vec!["CortexM4", "CortexM7"]);
        assert_eq!(peripherals(&ioc, Some("CortexM4")).unwrap(), vec!["UART5"]);
        assert_eq!(
            peripherals(&ioc, None).unwrap(),
            vec!["SPI2", "UART5"]
        );
    }

    #[test]
    fn context_order_follows_numeric_suffix() {
        let ioc = Ioc::parse("Mcu.Context2=Second\nMcu.Context1=First\nMcu.ContextNumberOfCores=2\n");
        assert_eq!(contexts(&ioc), vec!["First", "Second"]);
    }

    #[test]
    fn ips_match_is_tokenwise() {
        assert!(in_ips_line("CORTEX_M4:I,UART5:I", "UART5"));
        assert!(!in_ips_line("CORTEX_M4:I,UART56:I", "UART5"));
        assert!(!in_ips_line("USB_DEVICE_M4:I", "USB"));
    }

    #[test]
    fn reordered_ioc_yields_identical_peripherals() {
        let a = Ioc::parse("Mcu.IP1=I2C1\nMcu.IP2=USART2\nMcu.IP3=SPI3\n");
        let b = Ioc::parse("Mcu.IP3=SPI3\nMcu.IP1=I2C1\nMcu.IP2=USART2\n");
        assert_eq!(peripherals(&a, None).unwrap(), peripherals(&b, None).unwrap());
        assert_eq!(
            peripherals(&a, None).unwrap(),
            vec!["I2C1", "SPI3", "USART2"]
        );
    }

    #[test]
    fn missing_mcu_section_is_an_error() {
        let ioc = Ioc::parse("PB8.Signal=I2C1_SCL\n");
        assert!(peripherals(&ioc, None).is_err());
    }

    #[test]
    fn non_ip_prefixes_are_ignored() {
        let ioc = Ioc::parse("Mcu.IP1=RCC\nMcu.IP2=NVIC\nMcu.IP3=FDCAN1\nMcu.IPNb=3\n");
        assert_eq!(peripherals(&ioc, None).unwrap(), vec!["FDCAN1"]);
    }

    #[test]
    fn virtual_mode_lookup() {
        let ioc = Ioc::parse("SPI3.VirtualType=VM_MASTER\nSPI3.VirtualMode=Full_Duplex_Master\n");
        assert_eq!(
            virtual_mode(&ioc, "SPI3").as_deref(),
            Some("Full_Duplex_Master")
        );
        assert_eq!(virtual_mode(&ioc, "SPI1"), None);
    }

    #[test]
    fn i2c_filter_scan_stops_at_function_end() {
        let main_c = "\
static void MX_I2C1_Init(void)
{
  HAL_I2CEx_ConfigAnalogFilter(&hi2c1, I2C_ANALOGFILTER_DISABLE);
}
static void MX_I2C2_Init(void)
{
  HAL_I2CEx_ConfigDigitalFilter(&hi2c2, 15);
}
";
        let f1 = i2c_filters(main_c, "I2C1");
        assert_eq!(f1.get("ANF_ENABLE").map(String::as_str), Some("0"));
        assert_eq!(f1.get("DNF"), None);
        let f2 = i2c_filters(main_c, "I2C2");
        assert_eq!(f2.get("DNF").map(String::as_str), Some("15"));
        assert_eq!(f2.get("ANF_ENABLE"), None);
    }

    #[test]
    fn multi_line_pin_mask_accumulates() {
        let ioc = Ioc::parse(
            "Mcu.IP1=USART2\nPA2.Signal=USART2_TX\nPA3.Signal=USART2_RX\n",
        );
        let msp = "\
void HAL_UART_MspInit(UART_HandleTypeDef* huart)
{
  if(huart->Instance==USART2)
  {
    GPIO_InitStruct.Pin = GPIO_PIN_2
                          |GPIO_PIN_3;
    GPIO_InitStruct.Mode = GPIO_MODE_AF_PP;
    GPIO_InitStruct.Pull = GPIO_NOPULL;
    GPIO_InitStruct.Speed = GPIO_SPEED_FREQ_VERY_HIGH;
    GPIO_InitStruct.Alternate = GPIO_AF7_USART2;
    HAL_GPIO_Init(GPIOA, &GPIO_InitStruct);
  }
}
";
        let specs = extract(&ioc, "", msp, None).unwrap();
        let usart = &specs[0];
        assert_eq!(usart.pins.len(), 2);
        assert_eq!(usart.pins["USART2_TX"].pin, "GPIO_PIN_2");
        assert_eq!(usart.pins["USART2_RX"].pin, "GPIO_PIN_3");
        assert_eq!(usart.pins["USART2_RX"].alternate, "GPIO_AF7_USART2");
        // BTreeMap ordering: RX before TX.
        let signals: Vec<&String> = usart.pins.keys().collect();
        assert_eq!(signals, vec!["USART2_RX", "USART2_TX"]);
    }

    #[test]
    fn virtual_pins_and_foreign_signals_skipped() {
        let ioc = Ioc::parse(
            "Mcu.IP1=I2C1\nVP_SYS_VS_Systick.Signal=I2C1_FAKE\nPB0.Signal=GPIO_Output\nPB8.Signal=I2C1_SCL\n",
        );
        let pins = collect_pins(&ioc, "I2C1");
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].0, "I2C1_SCL");
    }

    #[test]
    fn unfinalized_region_omits_pin() {
        // Region for another instance only; I2C1 pin must not match.
        let msp = "\
void HAL_SPI_MspInit(SPI_HandleTypeDef* hspi)
{
  if(hspi->Instance==SPI3)
  {
    GPIO_InitStruct.Pin = GPIO_PIN_8;
    HAL_GPIO_Init(GPIOB, &GPIO_InitStruct);
  }
}
";
        assert!(pin_configuration(msp, "I2C1", "PB8", "SCL").is_none());
    }

    #[test]
    fn decorated_pin_keys_are_cleaned() {
        assert_eq!(clean_pin_id("PB8"), "PB8");
        assert_eq!(clean_pin_id("PC12-OSC32"), "PC12");
        assert_eq!(clean_pin_id("PA11 (PA9)"), "PA11");
        assert_eq!(clean_pin_id("PH0\\ (PH0-OSC_IN)"), "PH0");
    }

    #[test]
    fn labels_are_sanitized() {
        assert_eq!(sanitize_label("SCL [I2C1]"), "SCL");
        assert_eq!(sanitize_label("LED.Red"), "LED_Red");
        assert_eq!(sanitize_label("USER-BTN"), "USER_BTN");
    }

    #[test]
    fn device_family_requires_stm32() {
        let ioc = Ioc::parse("Mcu.Family=STM32F7\n");
        assert_eq!(device_family(&ioc).unwrap(), "STM32F7");
        let bad = Ioc::parse("Mcu.Family=XMC4000\n");
        assert!(device_family(&bad).is_err());
    }

    #[test]
    fn peripheral_without_pins_is_still_emitted() {
        let ioc = Ioc::parse("Mcu.IP1=ETH\n");
        let specs = extract(&ioc, "", "", None).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "ETH");
        assert!(specs[0].pins.is_empty());
    }
}
