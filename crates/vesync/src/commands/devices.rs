//! `vesync devices`: list devices registered to the account.

use tabled::Tabled;

use vesync_core::DeviceRecord;

use crate::cli::{DevicesArgs, GlobalOpts};
use crate::config::Context;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Region")]
    region: String,
    #[tabled(rename = "CID")]
    cid: String,
}

fn to_row(device: &DeviceRecord) -> DeviceRow {
    let dash = || "-".to_owned();
    DeviceRow {
        name: device.device_name.clone(),
        model: device.device_type.clone(),
        kind: device.product_type.clone().unwrap_or_else(dash),
        status: device.connection_status.clone().unwrap_or_else(dash),
        region: device.device_region.clone().unwrap_or_else(dash),
        cid: device.cid.clone(),
    }
}

fn keep(device: &DeviceRecord, args: &DevicesArgs) -> bool {
    if args.online && !device.is_online() {
        return false;
    }
    match args.product_type {
        Some(ref kind) => device
            .product_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(kind)),
        None => true,
    }
}

pub async fn handle(args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let ctx = Context::load(global)?;
    let manager = util::connect(&ctx).await?;

    if !manager.get_devices().await {
        return Err(CliError::DeviceListFailed);
    }

    let devices: Vec<DeviceRecord> = manager
        .devices()
        .await
        .into_iter()
        .filter(|d| keep(d, &args))
        .collect();

    let rendered = output::render_list(&global.output, &devices, to_row, |d| d.cid.clone())?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
