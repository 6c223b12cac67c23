//! Assets of the resource itself (`variant_id == None`) or of one variant.

use crate::diff::collection::plan;
use crate::diff::custom::{self, OwnerRef};
use crate::diff::{DiffError, DiffOptions, DiffOutcome};
use crate::model::{Asset, AssetDraft, UpdateAction};

pub fn diff_assets(
    variant_id: Option<u32>,
    old: &[Asset],
    new: &[AssetDraft],
    options: &DiffOptions,
    out: &mut DiffOutcome,
) -> Result<(), DiffError> {
    let plan = plan(
        "assets",
        old,
        new,
        |a: &Asset| a.draft.key.clone(),
        |a: &AssetDraft| a.key.clone(),
        &mut out.warnings,
    )?;

    for asset in plan.removed {
        if let Some(key) = &asset.draft.key {
            out.actions.push(UpdateAction::RemoveAsset {
                variant_id,
                asset_key: key.clone(),
            });
        }
    }

    for (old_asset, new_asset) in plan.matched {
        let Some(key) = new_asset.key.as_deref() else {
            continue;
        };
        let old_asset = &old_asset.draft;
        if old_asset.name != new_asset.name {
            out.actions.push(UpdateAction::ChangeAssetName {
                variant_id,
                asset_key: key.to_string(),
                name: new_asset.name.clone(),
            });
        }
        if old_asset.description != new_asset.description {
            out.actions.push(UpdateAction::SetAssetDescription {
                variant_id,
                asset_key: key.to_string(),
                description: new_asset.description.clone(),
            });
        }
        if old_asset.sources != new_asset.sources {
            out.actions.push(UpdateAction::SetAssetSources {
                variant_id,
                asset_key: key.to_string(),
                sources: new_asset.sources.clone(),
            });
        }
        if old_asset.tags != new_asset.tags {
            out.actions.push(UpdateAction::SetAssetTags {
                variant_id,
                asset_key: key.to_string(),
                tags: new_asset.tags.clone(),
            });
        }
        out.actions.extend(custom::diff_custom_fields(
            &OwnerRef::asset(variant_id, key),
            old_asset.custom.as_ref(),
            new_asset.custom.as_ref(),
            options,
        )?);
    }

    for asset in plan.added {
        custom::check_resolved(asset.custom.as_ref())?;
        out.actions.push(UpdateAction::AddAsset {
            variant_id,
            asset: asset.clone(),
        });
    }

    if let Some(asset_keys) = plan.reorder {
        out.actions.push(UpdateAction::ChangeAssetOrder { variant_id, asset_keys });
    }
    Ok(())
}
