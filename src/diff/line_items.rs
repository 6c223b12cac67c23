//! Line items of shopping lists. Matched by key, or by SKU when keyless.

use crate::diff::collection::plan;
use crate::diff::custom::{self, OwnerRef};
use crate::diff::{DiffError, DiffOptions, DiffOutcome};
use crate::model::{LineItem, LineItemDraft, UpdateAction};

fn identity(key: Option<&str>, sku: Option<&str>) -> Option<String> {
    key.map(|k| format!("key:{k}"))
        .or_else(|| sku.map(|s| format!("sku:{s}")))
}

pub fn diff_line_items(
    old: &[LineItem],
    new: &[LineItemDraft],
    options: &DiffOptions,
    out: &mut DiffOutcome,
) -> Result<(), DiffError> {
    let plan = plan(
        "line items",
        old,
        new,
        |li: &LineItem| identity(li.draft.key.as_deref(), li.draft.sku.as_deref()),
        |li: &LineItemDraft| identity(li.key.as_deref(), li.sku.as_deref()),
        &mut out.warnings,
    )?;

    for line_item in plan.removed {
        out.actions.push(UpdateAction::RemoveLineItem {
            line_item_id: line_item.id.clone(),
        });
    }

    for (old_item, new_item) in plan.matched {
        // A keyed item whose product changed cannot be edited in place.
        if old_item.draft.sku != new_item.sku {
            custom::check_resolved(new_item.custom.as_ref())?;
            out.actions.push(UpdateAction::RemoveLineItem {
                line_item_id: old_item.id.clone(),
            });
            out.actions.push(UpdateAction::AddLineItem {
                line_item: new_item.clone(),
            });
            continue;
        }
        let quantity = new_item.effective_quantity();
        if old_item.draft.effective_quantity() != quantity {
            out.actions.push(UpdateAction::ChangeLineItemQuantity {
                line_item_id: old_item.id.clone(),
                quantity,
            });
        }
        out.actions.extend(custom::diff_custom_fields(
            &OwnerRef::line_item(&old_item.id),
            old_item.draft.custom.as_ref(),
            new_item.custom.as_ref(),
            options,
        )?);
    }

    for line_item in plan.added {
        custom::check_resolved(line_item.custom.as_ref())?;
        out.actions.push(UpdateAction::AddLineItem {
            line_item: line_item.clone(),
        });
    }
    Ok(())
}
