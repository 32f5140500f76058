use anyhow::{bail, Result};
use boiler_protocol::relay::{set_relay, KasaPlug};
use std::env;
use std::thread::sleep;
use std::time::Duration;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        bail!("Usage: host [on|off|info|energy]");
    }
    let host = &args[1];
    let plug = KasaPlug::new(host);

    match args.get(2).map(String::as_str) {
        Some("on") => set_relay(host, true)?,
        Some("off") => set_relay(host, false)?,
        Some("info") => {
            let info = plug.sysinfo()?;
            println!(
                "{} ({}): relay {}, on for {} s",
                info.alias,
                info.model,
                if info.is_on() { "on" } else { "off" },
                info.on_time
            );
        }
        Some("energy") => {
            let meter = plug.realtime()?;
            println!("power {:.1} W, total {:.3} kWh", meter.watts(), meter.watt_hours() / 1000.0);
        }
        // Click the relay so the plug can be identified.
        None => {
            plug.set_relay(true)?;
            sleep(Duration::from_secs(1));
            plug.set_relay(false)?;
        }
        Some(arg) => bail!("Unknown arg: {}", arg),
    }
    Ok(())
}
