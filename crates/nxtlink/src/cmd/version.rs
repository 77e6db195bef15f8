use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("nxtlink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let libusb = rusb::version();
    println!("name: nxtlink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "libusb: {}.{}.{}",
        libusb.major(),
        libusb.minor(),
        libusb.micro()
    );

    Ok(SUCCESS)
}
