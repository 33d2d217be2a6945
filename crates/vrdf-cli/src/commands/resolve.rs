//! `resolve` and `list` commands.

use crate::{ResolveArgs, RootArgs};
use anyhow::{bail, Result};
use vrdf_io::{FuzzyMatch, SearchOrder, VolumeLocator};

/// Builds a locator from command-line roots.
pub fn locator(args: &RootArgs) -> Result<VolumeLocator> {
    let fuzzy = match args.fuzzy.to_ascii_lowercase().as_str() {
        "substring" | "sub" => FuzzyMatch::Substring,
        "delimited" | "delim" => FuzzyMatch::Delimited,
        other => bail!("Unknown fuzzy policy '{other}' (expected substring or delimited)"),
    };
    let order = if args.bundled_first { SearchOrder::BundledFirst } else { SearchOrder::CacheFirst };

    let mut locator = VolumeLocator::new().with_order(order).with_fuzzy(fuzzy);
    if let Some(dir) = &args.cache {
        locator = locator.with_cache_dir(dir);
    }
    if let Some(dir) = &args.bundled {
        locator = locator.with_bundled_dir(dir);
    }
    if locator.roots().is_empty() {
        bail!("No search roots: pass --cache and/or --bundled");
    }
    Ok(locator)
}

/// Prints the file a code resolves to.
pub fn run(args: ResolveArgs) -> Result<()> {
    let locator = locator(&args.roots)?;
    let Some(hit) = locator.resolve(&args.code) else {
        bail!("No volume matches '{}'", args.code);
    };
    println!("{}", hit.path.display());
    tracing::info!("{:?} match in {:?} root", hit.kind, hit.root);
    Ok(())
}

/// Prints every code found in the roots.
pub fn run_list(args: RootArgs) -> Result<()> {
    let locator = locator(&args)?;
    let found = locator.available();
    if found.is_empty() {
        println!("No volumes found");
        return Ok(());
    }
    for (code, path) in found {
        println!("{code:<12} {}", path.display());
    }
    Ok(())
}
