//! Machine lifecycle commands backed by the machine store

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{DriverOptions, MachineRecord, MachineStore};
use crate::driver::{Driver, MachineDriver};

/// Configure and provision a new machine, then save it to the store.
///
/// When provisioning fails the machine directory, including any generated
/// key pair, is deleted and nothing is saved.
pub async fn create_machine<D>(
    store: &MachineStore,
    mut driver: D,
    opts: &dyn DriverOptions,
) -> Result<()>
where
    D: MachineDriver + Serialize,
{
    let name = driver.machine_name().to_string();
    if store.exists(&name) {
        bail!("Host already exists: {name:?}");
    }

    driver.set_config_from_flags(opts).await?;

    info!("Creating machine {name}");
    if let Err(e) = driver.create().await {
        let dir = store.machine_dir(&name);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)
                .with_context(|| format!("Failed to clean up {}", dir.display()))?;
        }
        return Err(e.into());
    }

    store.save(&MachineRecord {
        name: name.clone(),
        driver_name: driver.driver_name().to_string(),
        driver,
    })?;
    info!("Machine {name} created");
    Ok(())
}

/// Load a stored machine's driver
pub fn load_driver(store: &MachineStore, name: &str) -> Result<Driver> {
    let record: MachineRecord<Driver> = store.load(name)?;
    if record.driver_name != record.driver.driver_name() {
        bail!(
            "Machine {name:?} uses unsupported driver {:?}",
            record.driver_name
        );
    }
    Ok(record.driver)
}

/// Delete the machine from the cluster, then from the store.
///
/// With `force` the store entry is removed even when the cluster objects
/// could not be deleted.
pub async fn remove_machine<D: MachineDriver>(
    store: &MachineStore,
    driver: &D,
    force: bool,
) -> Result<()> {
    let name = driver.machine_name();
    match driver.remove().await {
        Ok(()) => {}
        Err(e) if force => warn!("Failed to remove {name} from the cluster: {e}"),
        Err(e) => return Err(e.into()),
    }
    store.remove(name)?;
    info!("Machine {name} removed");
    Ok(())
}
