use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, QuerySelect};

use crate::{
    dto::pages::{Dashboard, RetailerStats, WholesalerStats},
    entity::{
        products::{Column, Entity as Products},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_role},
    models::{AddedBy, ProductStatus, Role, User},
    response::{ApiResponse, Meta},
    services::{auth_service::user_from_entity, product_service::to_products},
    state::AppState,
};

pub const PENDING_REVIEW_LIMIT: u64 = 50;

pub fn parse_page(raw: &str) -> AppResult<Role> {
    raw.parse::<Role>()
        .map_err(|_| AppError::not_found(format!("No dashboard for {raw}")))
}

pub async fn dashboard(
    state: &AppState,
    user: &AuthUser,
    page: Role,
) -> AppResult<ApiResponse<Dashboard>> {
    ensure_role(user, page)?;

    let profile = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .map(user_from_entity)
        .transpose()?;
    let message = welcome(profile.as_ref());

    let data = match page {
        Role::Customer => Dashboard::Customer {
            message,
            user: profile,
        },
        Role::Retailer => {
            let own = Products::find()
                .filter(
                    Condition::all()
                        .add(Column::Deleted.eq(false))
                        .add(Column::Owner.eq(user.user_id))
                        .add(Column::AddedBy.eq(AddedBy::Retailer.as_str())),
                )
                .order_by_desc(Column::CreatedAt)
                .all(&state.orm)
                .await?;
            let pending = Products::find()
                .filter(
                    Condition::all()
                        .add(Column::Deleted.eq(false))
                        .add(Column::AddedBy.eq(AddedBy::Wholesaler.as_str()))
                        .add(Column::Status.eq(ProductStatus::Pending.as_str())),
                )
                .order_by_desc(Column::CreatedAt)
                .limit(PENDING_REVIEW_LIMIT)
                .all(&state.orm)
                .await?;

            let stats = RetailerStats {
                my_product_count: own.len(),
                pending_wholesaler_count: pending.len(),
            };
            Dashboard::Retailer {
                message,
                user: profile,
                stats,
                products: to_products(&state.orm, own).await?,
                pending_wholesaler: to_products(&state.orm, pending).await?,
            }
        }
        Role::Wholesaler => {
            let own = Products::find()
                .filter(
                    Condition::all()
                        .add(Column::Deleted.eq(false))
                        .add(Column::AddedBy.eq(AddedBy::Wholesaler.as_str()))
                        .add(
                            Condition::any()
                                .add(Column::SourceWholesaler.eq(user.user_id))
                                .add(Column::Owner.eq(user.user_id)),
                        ),
                )
                .order_by_desc(Column::CreatedAt)
                .all(&state.orm)
                .await?;
            let products = to_products(&state.orm, own).await?;

            let count = |status: ProductStatus| products.iter().filter(|p| p.status == status).count();
            let stats = WholesalerStats {
                total: products.len(),
                approved: count(ProductStatus::Approved),
                pending: count(ProductStatus::Pending),
            };
            Dashboard::Wholesaler {
                message,
                user: profile,
                stats,
                products,
            }
        }
    };

    tracing::debug!(user_id = %user.user_id, role = %data.role(), "dashboard served");
    Ok(ApiResponse::success("OK", data, Some(Meta::empty())))
}

fn welcome(profile: Option<&User>) -> String {
    let name = profile
        .and_then(|u| u.name.as_deref().or(u.email.as_deref()))
        .unwrap_or("there");
    format!("Welcome {name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_page_is_not_found() {
        assert_eq!(parse_page("retailer").unwrap(), Role::Retailer);
        let err = parse_page("admin").unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[test]
    fn welcome_falls_back_to_email() {
        assert_eq!(welcome(None), "Welcome there");
    }
}
