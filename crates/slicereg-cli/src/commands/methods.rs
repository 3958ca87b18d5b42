use anyhow::Result;
use slicereg_core::config::RegistrationConfig;
use slicereg_core::stack::MethodRegistry;

pub fn run() -> Result<()> {
    let registry = MethodRegistry::with_defaults(&RegistrationConfig::default());
    for id in registry.ids() {
        println!("{id}");
    }
    Ok(())
}
