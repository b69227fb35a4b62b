use anyhow::Result;
use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use std::time::Duration;

use crate::cli::SerialOpts;

/// Writes wait for the board as long as it takes. A timed-out `write_all`
/// can leave half a command on the wire. Kept under poll's i32 millisecond limit.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(24 * 24 * 60 * 60);

/// Golduino firmware listens at 8N1.
pub fn open_port(opts: &SerialOpts) -> Result<Box<dyn SerialPort>> {
    let builder = serialport::new(&opts.dev, opts.baud)
        .timeout(WRITE_TIMEOUT)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(if opts.rtscts {
            FlowControl::Hardware
        } else {
            FlowControl::None
        });

    builder
        .open()
        .map_err(|e| anyhow::anyhow!("open {}: {}", opts.dev, e))
}

pub fn list_ports() -> Result<()> {
    let ports = serialport::available_ports()?;
    if ports.is_empty() {
        eprintln!("no serial ports found");
        return Ok(());
    }
    for p in ports {
        println!("{}\t{}", p.port_name, describe(&p.port_type));
    }
    Ok(())
}

fn describe(kind: &SerialPortType) -> String {
    match kind {
        SerialPortType::UsbPort(usb) => format!(
            "usb {:04x}:{:04x} {}",
            usb.vid,
            usb.pid,
            usb.product.as_deref().unwrap_or("")
        ),
        SerialPortType::PciPort => "pci".to_string(),
        SerialPortType::BluetoothPort => "bluetooth".to_string(),
        SerialPortType::Unknown => "unknown".to_string(),
    }
}
