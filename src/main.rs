use clap::Parser;
use vpcinfo::{
    Registry,
    cli::{Args, RegistryLoader, Resource},
    error::VpcError,
};

#[tokio::main]
async fn main() -> Result<(), VpcError> {
    env_logger::init();

    let args = Args::parse();

    let config = RegistryLoader::load(&args)?;
    let registry = Registry::from_config(config)?;
    log::debug!("looking up {:?} with {:?}", args.resource, registry.config());

    match args.resource {
        Resource::Platform => println!("{}", registry.lookup_platform().await?),
        Resource::Zone => println!("{}", registry.lookup_zone().await?),
        Resource::Subnets => {
            let subnets = registry.lookup_subnets().await?;
            match args.addr {
                Some(addr) => match subnets.lookup_ip(addr) {
                    Some(subnet) => println!("{subnet}"),
                    None => {
                        eprintln!("{addr}: not found in {subnets}");
                        std::process::exit(1);
                    }
                },
                None => subnets.iter().for_each(|subnet| println!("{subnet}")),
            }
        }
    }

    Ok(())
}
