use std::sync::Arc;
use std::time::Instant;

use colored::*;

use fleetr_common::config::Config;
use fleetr_common::identity::{Item, Model};
use fleetr_common::merge_set::Identifiable;
use fleetr_common::network::{address, mac};
use fleetr_core::inventory::Inventory;
use fleetr_core::vendors::MacOuiRepo;

use crate::commands::InventoryArgs;
use crate::fprint;
use crate::terminal::{colors, print};

type Detail = (String, ColoredString);

/// Loads every record file into a fresh inventory and looks up vendors.
pub async fn load(args: &InventoryArgs, cfg: &Config) -> anyhow::Result<Arc<Inventory>> {
    let started: Instant = Instant::now();
    let inventory: Arc<Inventory> = Arc::new(Inventory::new());

    let records: usize = inventory.load_files(&args.files).await;
    if records == 0 {
        anyhow::bail!("no device records could be loaded from {} files", args.files.len());
    }

    if !cfg.no_vendors {
        let vendors: usize = inventory.enrich_vendors(&MacOuiRepo);
        tracing::debug!("resolved {vendors} vendors");
    }

    tracing::debug!("inventory loaded in {:.2}s", started.elapsed().as_secs_f64());
    Ok(inventory)
}

pub async fn inventory(args: InventoryArgs, cfg: &Config) -> anyhow::Result<()> {
    let inventory: Arc<Inventory> = load(&args, cfg).await?;

    let mut items: Vec<Item> = inventory.items().snapshot();
    if items.is_empty() {
        print::no_results("devices");
        return Ok(());
    }
    items.sort_by_key(|item| item.to_string());

    print::header("inventory", cfg.quiet);
    if cfg.quiet < 2 {
        for (idx, item) in items.iter().enumerate() {
            print_item_tree(idx, item);
            if idx + 1 != items.len() {
                fprint!();
            }
        }
    }

    let summary: ColoredString = format!(
        "{} devices, {} accounts",
        items.len().to_string().green().bold(),
        inventory.accounts().len().to_string().green().bold()
    )
    .color(colors::TEXT_DEFAULT);

    match cfg.quiet {
        0 => {
            print::fat_separator();
            print::centerln(&summary.to_string());
        }
        _ => fleetr_common::success!("{summary}"),
    }
    Ok(())
}

fn print_item_tree(idx: usize, item: &Item) {
    let title: String = item
        .remote_id
        .as_deref()
        .map(|id| format!("device {id}"))
        .unwrap_or_else(|| "device without remote id".to_string());
    print::tree_head(idx, &title);
    print::as_tree_one_level(item_details(item));
}

fn item_details(item: &Item) -> Vec<Detail> {
    let mut details: Vec<Detail> = Vec::new();

    if let Some(mac_addr) = &item.mac_address {
        details.push(("mac".into(), mac::display_mac(mac_addr).color(colors::MAC_ADDR)));
    }
    if let Some(imei) = &item.imei {
        details.push(("imei".into(), imei.to_string().normal()));
    }
    if let Some(imsi) = &item.imsi {
        details.push(("imsi".into(), imsi.to_string().normal()));
    }
    if let Some(net) = &item.ipv4 {
        details.push(("ipv4".into(), address::format_ipv4(net).color(colors::IPV4)));
    }
    if item.model != Model::Unknown {
        details.push(("model".into(), item.model.as_str().color(colors::SECONDARY)));
    }
    if let Some(vendor) = &item.vendor {
        details.push(("vendor".into(), vendor.as_str().color(colors::SECONDARY)));
    }
    if let Some(serial) = &item.serial_number {
        details.push(("serial".into(), serial.as_str().normal()));
    }
    if let Some(account) = &item.account {
        details.push(("account".into(), account.to_string().color(colors::ACCENT)));
    }
    if item.key().is_empty() {
        details.push(("note".into(), "no identifiers, never merged".yellow()));
    }
    details
}
