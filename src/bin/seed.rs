use chrono::Utc;
use livemart_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::{
        products::{ActiveModel as ProductActive, Column as ProductCol, Entity as Products},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    models::{AuthProvider, Role},
    workflow,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&orm).await?;

    let wholesaler = ensure_user(
        &orm,
        "wholesaler@example.com",
        "Green Valley Wholesale",
        Role::Wholesaler,
        (12.9716, 77.5946),
    )
    .await?;
    let retailer = ensure_user(
        &orm,
        "retailer@example.com",
        "Corner Fresh Mart",
        Role::Retailer,
        (12.9352, 77.6245),
    )
    .await?;
    let customer = ensure_user(
        &orm,
        "customer@example.com",
        "Demo Customer",
        Role::Customer,
        (12.9279, 77.6271),
    )
    .await?;

    seed_products(&orm, wholesaler, Role::Wholesaler, &[
        ("Basmati Rice 25kg", "Aged long grain rice", "grains", 185000, 40),
        ("Sunflower Oil 15L", "Refined cooking oil tin", "oils", 210000, 25),
    ])
    .await?;
    seed_products(&orm, retailer, Role::Retailer, &[
        ("Alphonso Mangoes 1kg", "Ripe, hand picked", "fruit", 45000, 60),
        ("Whole Milk 1L", "Farm fresh, pasteurised", "dairy", 6800, 120),
        ("Brown Bread", "Baked this morning", "bakery", 5500, 30),
    ])
    .await?;

    println!(
        "Seed completed. Wholesaler: {wholesaler}, Retailer: {retailer}, Customer: {customer}"
    );
    Ok(())
}

async fn ensure_user(
    orm: &DatabaseConnection,
    email: &str,
    name: &str,
    role: Role,
    (lat, lng): (f64, f64),
) -> anyhow::Result<Uuid> {
    if let Some(user) = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(orm)
        .await?
    {
        println!("User {email} already present");
        return Ok(user.id);
    }

    let now = Utc::now();
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(Some(name.to_string())),
        email: Set(Some(email.to_string())),
        phone: Set(None),
        role: Set(role.as_str().to_string()),
        provider: Set(AuthProvider::Local.as_str().to_string()),
        social_id: Set(None),
        verified: Set(true),
        address: Set(Some("Bengaluru".to_string())),
        lat: Set(Some(lat)),
        lng: Set(Some(lng)),
        place_id: Set(None),
        otp_hash: Set(None),
        otp_expires_at: Set(None),
        otp_verified: Set(true),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(orm)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user.id)
}

async fn seed_products(
    orm: &DatabaseConnection,
    creator: Uuid,
    role: Role,
    items: &[(&str, &str, &str, i64, i32)],
) -> anyhow::Result<()> {
    let init = workflow::initial_state(creator, role)?;

    for &(title, description, category, price, quantity) in items {
        let exists = Products::find()
            .filter(
                Condition::all()
                    .add(ProductCol::Title.eq(title))
                    .add(ProductCol::Owner.eq(creator)),
            )
            .one(orm)
            .await?
            .is_some();
        if exists {
            continue;
        }

        let now = Utc::now();
        ProductActive {
            id: Set(Uuid::new_v4()),
            title: Set(title.to_string()),
            description: Set(description.to_string()),
            price: Set(price),
            quantity: Set(quantity),
            category: Set(category.to_string()),
            added_by: Set(init.added_by.as_str().to_string()),
            source_wholesaler: Set(init.source_wholesaler),
            owner: Set(init.owner),
            status: Set(init.status.as_str().to_string()),
            // Retailer stock goes straight to the storefront for demos.
            visible_to_customer: Set(role == Role::Retailer),
            deleted: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(orm)
        .await?;
    }

    println!("Seeded {} {role} products", items.len());
    Ok(())
}
