//! List all connected Rift headsets and Vive controllers.

fn main() {
    env_logger::init();

    match vrtrack::list_devices() {
        Ok(devices) => {
            println!("Found {} device(s):", devices.len());
            for (i, dev) in devices.iter().enumerate() {
                let interfaces: Vec<i32> = dev.interfaces.iter().map(|(n, _)| *n).collect();
                println!(
                    "  [{}] {}  Serial={}  Interfaces={:?}",
                    i,
                    dev.kind.name(),
                    dev.serial,
                    interfaces
                );
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
