//! Product approval workflow.
//!
//! Wholesalers submit listings that wait for a retailer. Approval hands the
//! listing over to the approving retailer; publishing to customers is a
//! separate step controlled by `visible_to_customer`.

use std::{fmt, str::FromStr};

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{AddedBy, ProductStatus, Role},
};

/// Workflow fields assigned when a product is created.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialState {
    pub added_by: AddedBy,
    pub status: ProductStatus,
    pub owner: Uuid,
    pub source_wholesaler: Option<Uuid>,
    pub visible_to_customer: bool,
}

pub fn initial_state(creator: Uuid, role: Role) -> AppResult<InitialState> {
    match role {
        Role::Wholesaler => Ok(InitialState {
            added_by: AddedBy::Wholesaler,
            status: ProductStatus::Pending,
            owner: creator,
            source_wholesaler: Some(creator),
            visible_to_customer: false,
        }),
        Role::Retailer => Ok(InitialState {
            added_by: AddedBy::Retailer,
            status: ProductStatus::Approved,
            owner: creator,
            source_wholesaler: None,
            visible_to_customer: false,
        }),
        Role::Customer => Err(AppError::forbidden(
            "Only wholesalers and retailers can add products",
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalAction {
    Approve,
    Reject,
}

impl FromStr for ApprovalAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" => Ok(ApprovalAction::Approve),
            "reject" => Ok(ApprovalAction::Reject),
            _ => Err(AppError::bad_request(
                r#"action must be "approve" or "reject""#,
            )),
        }
    }
}

impl fmt::Display for ApprovalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalAction::Approve => f.write_str("approve"),
            ApprovalAction::Reject => f.write_str("reject"),
        }
    }
}

/// What the reviewing retailer asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalDecision {
    pub action: ApprovalAction,
    pub price: Option<i64>,
    pub quantity: Option<i32>,
    pub visible_to_customer: Option<bool>,
}

/// The workflow-relevant part of a stored product.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowState {
    pub added_by: AddedBy,
    pub status: ProductStatus,
    pub owner: Uuid,
    pub source_wholesaler: Option<Uuid>,
    pub visible_to_customer: bool,
    pub price: i64,
    pub quantity: i32,
}

/// Reviewer must be a retailer. Checked before the product is loaded.
pub fn ensure_reviewer(role: Role) -> AppResult<()> {
    if role != Role::Retailer {
        return Err(AppError::forbidden("Only retailer can approve/reject"));
    }
    Ok(())
}

/// Applies an approve/reject decision and returns the next state.
///
/// `source_wholesaler` is carried over untouched in every branch. Only a
/// pending wholesaler listing can be reviewed, so ownership moves at most once.
pub fn review(
    state: &WorkflowState,
    reviewer: Uuid,
    reviewer_role: Role,
    decision: &ApprovalDecision,
) -> AppResult<WorkflowState> {
    ensure_reviewer(reviewer_role)?;

    if state.added_by != AddedBy::Wholesaler {
        return Err(AppError::bad_request(
            "Only wholesaler-added products require approval",
        ));
    }
    if state.status != ProductStatus::Pending {
        return Err(AppError::bad_request(format!(
            "Product is already {}",
            state.status
        )));
    }

    let mut next = state.clone();
    match decision.action {
        ApprovalAction::Approve => {
            if let Some(price) = decision.price {
                next.price = validate_price(price)?;
            }
            if let Some(quantity) = decision.quantity {
                next.quantity = validate_quantity(quantity)?;
            }
            next.status = ProductStatus::Approved;
            next.owner = reviewer;
            next.visible_to_customer = decision.visible_to_customer.unwrap_or(false);
        }
        ApprovalAction::Reject => {
            next.status = ProductStatus::Rejected;
            next.visible_to_customer = false;
        }
    }
    Ok(next)
}

pub fn validate_price(price: i64) -> AppResult<i64> {
    if price < 0 {
        return Err(AppError::bad_request("price must not be negative"));
    }
    Ok(price)
}

pub fn validate_quantity(quantity: i32) -> AppResult<i32> {
    if quantity < 0 {
        return Err(AppError::bad_request("quantity must not be negative"));
    }
    Ok(quantity)
}
