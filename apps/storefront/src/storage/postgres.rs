// src/storage/postgres.rs

//! PostgreSQL backend on a `sqlx` pool. Queries are checked at run time so the
//! crate builds without a live database.

use super::{
  insufficient_stock, stale_status, ApprovalStore, ApprovalSubject, ApprovalTarget, CartStore, CatalogStore, DeliveryStore, FoodItemFilter, FoodStore,
  NewAssignment, NewBooking, NewCategory, NewDeliveryBoy, NewFoodItem, NewFoodOrder, NewFoodVendor, NewOrder,
  NewServiceProvider, NewUser, OrderStore, PaymentOutcome, ProductFilter, SellerStore, ServiceStore, Storage,
  UserStore,
};
use crate::errors::{AppError, Result};
use crate::models::product::ProductListing;
use crate::models::{
  Approval, ApprovalStatus, BookingStatus, CartItem, CartLine, Category, DeliveryAssignment, DeliveryBoy,
  DeliveryStatus, FoodItem, FoodOrder, FoodOrderStatus, FoodVendor, Order, OrderItem, OrderStatus, OrderWithItems,
  PaymentMethod, PaymentStatus, Product, Seller, SellerProfile, ServiceBooking, ServiceProvider, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct PgStorage {
  pool: PgPool,
}

impl PgStorage {
  #[instrument(name = "storage::connect", skip_all)]
  pub async fn connect(database_url: &str) -> Result<Self> {
    let pool = PgPoolOptions::new()
      .max_connections(10)
      .acquire_timeout(Duration::from_secs(5))
      .connect(database_url)
      .await?;
    info!("Database connection pool established.");
    Ok(Self { pool })
  }

  pub async fn migrate(&self) -> Result<()> {
    sqlx::migrate!("./migrations").run(&self.pool).await?;
    info!("Database migrations applied.");
    Ok(())
  }

  /// Attaches item rows to a batch of orders in one query.
  async fn with_items(&self, orders: Vec<Order>, seller_id: Option<i32>) -> Result<Vec<OrderWithItems>> {
    if orders.is_empty() {
      return Ok(Vec::new());
    }
    let ids: Vec<i32> = orders.iter().map(|o| o.id).collect();
    let items = sqlx::query_as::<_, OrderItem>(
      "SELECT * FROM order_items WHERE order_id = ANY($1) AND ($2::INT IS NULL OR seller_id = $2) ORDER BY id",
    )
    .bind(&ids)
    .bind(seller_id)
    .fetch_all(&self.pool)
    .await?;

    let mut by_order: HashMap<i32, Vec<OrderItem>> = HashMap::new();
    for item in items {
      by_order.entry(item.order_id).or_default().push(item);
    }
    Ok(
      orders
        .into_iter()
        .map(|order| {
          let items = by_order.remove(&order.id).unwrap_or_default();
          OrderWithItems { order, items }
        })
        .collect(),
    )
  }

  /// Explains why a guarded status update matched no row: either the row is
  /// gone or its status moved on.
  async fn stale_or_missing(&self, table: &'static str, what: &str, id: i32) -> AppError {
    let current = sqlx::query_scalar::<_, String>(&format!("SELECT status FROM {} WHERE id = $1", table))
      .bind(id)
      .fetch_optional(&self.pool)
      .await;
    match current {
      Ok(Some(status)) => stale_status(what, id, status),
      Ok(None) => AppError::not_found(what, id),
      Err(e) => e.into(),
    }
  }
}

#[async_trait]
impl UserStore for PgStorage {
  async fn find_user(&self, id: &str) -> Result<Option<User>> {
    Ok(
      sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
    Ok(
      sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn create_user(&self, new_user: NewUser) -> Result<User> {
    Ok(
      sqlx::query_as::<_, User>(
        "INSERT INTO users (id, email, first_name, last_name, password_hash, is_admin) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
      )
      .bind(&new_user.id)
      .bind(&new_user.email)
      .bind(&new_user.first_name)
      .bind(&new_user.last_name)
      .bind(&new_user.password_hash)
      .bind(new_user.is_admin)
      .fetch_one(&self.pool)
      .await?,
    )
  }

  async fn upsert_user(&self, new_user: NewUser) -> Result<User> {
    Ok(
      sqlx::query_as::<_, User>(
        "INSERT INTO users (id, email, first_name, last_name, password_hash, is_admin) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email, first_name = EXCLUDED.first_name, \
           last_name = EXCLUDED.last_name, is_admin = EXCLUDED.is_admin, \
           password_hash = COALESCE(EXCLUDED.password_hash, users.password_hash), updated_at = NOW() \
         RETURNING *",
      )
      .bind(&new_user.id)
      .bind(&new_user.email)
      .bind(&new_user.first_name)
      .bind(&new_user.last_name)
      .bind(&new_user.password_hash)
      .bind(new_user.is_admin)
      .fetch_one(&self.pool)
      .await?,
    )
  }
}

#[async_trait]
impl SellerStore for PgStorage {
  async fn create_seller(&self, user_id: &str, profile: SellerProfile) -> Result<Seller> {
    Ok(
      sqlx::query_as::<_, Seller>(
        "INSERT INTO sellers (user_id, business_name, description, business_address, business_phone, \
           gst_number, bank_account_number, ifsc_code) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
      )
      .bind(user_id)
      .bind(&profile.business_name)
      .bind(&profile.description)
      .bind(&profile.business_address)
      .bind(&profile.business_phone)
      .bind(&profile.gst_number)
      .bind(&profile.bank_account_number)
      .bind(&profile.ifsc_code)
      .fetch_one(&self.pool)
      .await?,
    )
  }

  async fn seller_by_id(&self, id: i32) -> Result<Option<Seller>> {
    Ok(
      sqlx::query_as::<_, Seller>("SELECT * FROM sellers WHERE id = $1")
        .bind(id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn seller_by_user(&self, user_id: &str) -> Result<Option<Seller>> {
    Ok(
      sqlx::query_as::<_, Seller>("SELECT * FROM sellers WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn update_seller_profile(&self, id: i32, profile: SellerProfile) -> Result<Seller> {
    sqlx::query_as::<_, Seller>(
      "UPDATE sellers SET business_name = $2, description = $3, business_address = $4, business_phone = $5, \
         gst_number = $6, bank_account_number = $7, ifsc_code = $8, updated_at = NOW() \
       WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&profile.business_name)
    .bind(&profile.description)
    .bind(&profile.business_address)
    .bind(&profile.business_phone)
    .bind(&profile.gst_number)
    .bind(&profile.bank_account_number)
    .bind(&profile.ifsc_code)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| AppError::not_found("Seller", id))
  }

  async fn list_sellers(&self, approval: Option<ApprovalStatus>) -> Result<Vec<Seller>> {
    Ok(
      sqlx::query_as::<_, Seller>(
        "SELECT * FROM sellers WHERE ($1::VARCHAR IS NULL OR approval_status = $1) ORDER BY created_at DESC, id DESC",
      )
      .bind(approval.map(ApprovalStatus::as_str))
      .fetch_all(&self.pool)
      .await?,
    )
  }
}

#[async_trait]
impl CatalogStore for PgStorage {
  async fn list_categories(&self, active_only: bool) -> Result<Vec<Category>> {
    Ok(
      sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE (NOT $1 OR is_active) ORDER BY name")
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?,
    )
  }

  async fn category_by_id(&self, id: i32) -> Result<Option<Category>> {
    Ok(
      sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
        .bind(id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn create_category(&self, category: NewCategory) -> Result<Category> {
    Ok(
      sqlx::query_as::<_, Category>(
        "INSERT INTO categories (name, slug, description, image_url) VALUES ($1, $2, $3, $4) RETURNING *",
      )
      .bind(&category.name)
      .bind(&category.slug)
      .bind(&category.description)
      .bind(&category.image_url)
      .fetch_one(&self.pool)
      .await?,
    )
  }

  async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
    let pattern = filter.search.as_ref().map(|term| format!("%{}%", term));
    Ok(
      sqlx::query_as::<_, Product>(
        "SELECT * FROM products \
         WHERE (NOT $1 OR is_active) \
           AND ($2::VARCHAR IS NULL OR approval_status = $2) \
           AND ($3::INT IS NULL OR category_id = $3) \
           AND ($4::INT IS NULL OR seller_id = $4) \
           AND ($5::VARCHAR IS NULL OR name ILIKE $5) \
         ORDER BY created_at DESC, id DESC",
      )
      .bind(filter.active_only)
      .bind(filter.approval.map(ApprovalStatus::as_str))
      .bind(filter.category_id)
      .bind(filter.seller_id)
      .bind(pattern)
      .fetch_all(&self.pool)
      .await?,
    )
  }

  async fn product_by_id(&self, id: i32) -> Result<Option<Product>> {
    Ok(
      sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn products_by_ids(&self, ids: &[i32]) -> Result<Vec<Product>> {
    Ok(
      sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(&self.pool)
        .await?,
    )
  }

  async fn create_product(&self, seller_id: i32, listing: ProductListing) -> Result<Product> {
    Ok(
      sqlx::query_as::<_, Product>(
        "INSERT INTO products (seller_id, category_id, name, description, price_cents, original_price_cents, \
           sku, stock, images) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
      )
      .bind(seller_id)
      .bind(listing.category_id)
      .bind(&listing.name)
      .bind(&listing.description)
      .bind(listing.price_cents)
      .bind(listing.original_price_cents)
      .bind(&listing.sku)
      .bind(listing.stock)
      .bind(&listing.images)
      .fetch_one(&self.pool)
      .await?,
    )
  }

  async fn update_product(&self, id: i32, listing: ProductListing) -> Result<Product> {
    sqlx::query_as::<_, Product>(
      "UPDATE products SET category_id = $2, name = $3, description = $4, price_cents = $5, \
         original_price_cents = $6, sku = $7, stock = $8, images = $9, updated_at = NOW() \
       WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(listing.category_id)
    .bind(&listing.name)
    .bind(&listing.description)
    .bind(listing.price_cents)
    .bind(listing.original_price_cents)
    .bind(&listing.sku)
    .bind(listing.stock)
    .bind(&listing.images)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| AppError::not_found("Product", id))
  }

  async fn deactivate_product(&self, id: i32) -> Result<()> {
    let mut tx = self.pool.begin().await?;
    let updated = sqlx::query("UPDATE products SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
      .bind(id)
      .execute(&mut *tx)
      .await?;
    if updated.rows_affected() == 0 {
      return Err(AppError::not_found("Product", id));
    }
    sqlx::query("DELETE FROM cart_items WHERE product_id = $1")
      .bind(id)
      .execute(&mut *tx)
      .await?;
    tx.commit().await?;
    Ok(())
  }
}

#[async_trait]
impl CartStore for PgStorage {
  async fn cart_lines(&self, user_id: &str) -> Result<Vec<CartLine>> {
    let items = sqlx::query_as::<_, CartItem>("SELECT * FROM cart_items WHERE user_id = $1 ORDER BY created_at, id")
      .bind(user_id)
      .fetch_all(&self.pool)
      .await?;
    let ids: Vec<i32> = items.iter().map(|i| i.product_id).collect();
    let mut products: HashMap<i32, Product> = self
      .products_by_ids(&ids)
      .await?
      .into_iter()
      .map(|p| (p.id, p))
      .collect();
    Ok(
      items
        .into_iter()
        .filter_map(|item| {
          let product = products.remove(&item.product_id)?;
          Some(CartLine { item, product })
        })
        .collect(),
    )
  }

  async fn cart_item(&self, id: i32) -> Result<Option<CartItem>> {
    Ok(
      sqlx::query_as::<_, CartItem>("SELECT * FROM cart_items WHERE id = $1")
        .bind(id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn cart_item_for(&self, user_id: &str, product_id: i32) -> Result<Option<CartItem>> {
    Ok(
      sqlx::query_as::<_, CartItem>("SELECT * FROM cart_items WHERE user_id = $1 AND product_id = $2")
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn add_to_cart(&self, user_id: &str, product_id: i32, quantity: i32) -> Result<CartItem> {
    // Both the insert and the increment are capped at the product's stock, so
    // no row comes back when the line would exceed it.
    let item = sqlx::query_as::<_, CartItem>(
      "INSERT INTO cart_items (user_id, product_id, quantity) \
       SELECT $1, p.id, $3 FROM products p WHERE p.id = $2 AND p.stock >= $3 \
       ON CONFLICT (user_id, product_id) \
       DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity, updated_at = NOW() \
       WHERE cart_items.quantity + EXCLUDED.quantity <= (SELECT stock FROM products WHERE id = EXCLUDED.product_id) \
       RETURNING *",
    )
    .bind(user_id)
    .bind(product_id)
    .bind(quantity)
    .fetch_optional(&self.pool)
    .await?;
    if let Some(item) = item {
      return Ok(item);
    }

    let available = sqlx::query_scalar::<_, i32>("SELECT stock FROM products WHERE id = $1")
      .bind(product_id)
      .fetch_optional(&self.pool)
      .await?;
    match available {
      Some(available) => Err(insufficient_stock(available)),
      None => Err(AppError::not_found("Product", product_id)),
    }
  }

  async fn set_cart_quantity(&self, id: i32, quantity: i32) -> Result<CartItem> {
    sqlx::query_as::<_, CartItem>("UPDATE cart_items SET quantity = $2, updated_at = NOW() WHERE id = $1 RETURNING *")
      .bind(id)
      .bind(quantity)
      .fetch_optional(&self.pool)
      .await?
      .ok_or_else(|| AppError::not_found("Cart item", id))
  }

  async fn remove_cart_item(&self, id: i32) -> Result<bool> {
    let result = sqlx::query("DELETE FROM cart_items WHERE id = $1")
      .bind(id)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() > 0)
  }

  async fn clear_cart(&self, user_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
      .bind(user_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }
}

#[async_trait]
impl OrderStore for PgStorage {
  #[instrument(name = "storage::place_order", skip_all, fields(order_number = %order.order_number))]
  async fn place_order(&self, order: NewOrder) -> Result<OrderWithItems> {
    let mut tx = self.pool.begin().await?;

    for line in &order.lines {
      let reserved = sqlx::query(
        "UPDATE products SET stock = stock - $1, updated_at = NOW() WHERE id = $2 AND stock >= $1",
      )
      .bind(line.quantity)
      .bind(line.product_id)
      .execute(&mut *tx)
      .await?;
      if reserved.rows_affected() == 0 {
        // Dropping the transaction rolls back earlier reservations.
        return Err(AppError::Validation(format!(
          "Insufficient stock for {}",
          line.product_name
        )));
      }
    }

    let row = sqlx::query_as::<_, Order>(
      "INSERT INTO orders (user_id, order_number, status, subtotal_cents, tax_cents, shipping_cents, total_cents, \
         payment_method, payment_status, shipping_address) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
    )
    .bind(&order.user_id)
    .bind(&order.order_number)
    .bind(order.status.as_str())
    .bind(order.subtotal_cents)
    .bind(order.tax_cents)
    .bind(order.shipping_cents)
    .bind(order.total_cents)
    .bind(order.payment_method.as_str())
    .bind(PaymentStatus::Pending.as_str())
    .bind(&order.shipping_address)
    .fetch_one(&mut *tx)
    .await?;

    let mut items = Vec::with_capacity(order.lines.len());
    for line in &order.lines {
      let item = sqlx::query_as::<_, OrderItem>(
        "INSERT INTO order_items (order_id, product_id, seller_id, product_name, quantity, unit_price_cents, \
           total_cents) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
      )
      .bind(row.id)
      .bind(line.product_id)
      .bind(line.seller_id)
      .bind(&line.product_name)
      .bind(line.quantity)
      .bind(line.unit_price_cents)
      .bind(line.unit_price_cents * i64::from(line.quantity))
      .fetch_one(&mut *tx)
      .await?;
      items.push(item);
    }

    tx.commit().await?;
    Ok(OrderWithItems { order: row, items })
  }

  async fn set_payment_reference(&self, order_id: i32, reference: &str) -> Result<()> {
    let result = sqlx::query("UPDATE orders SET payment_reference = $2, updated_at = NOW() WHERE id = $1")
      .bind(order_id)
      .bind(reference)
      .execute(&self.pool)
      .await?;
    if result.rows_affected() == 0 {
      return Err(AppError::not_found("Order", order_id));
    }
    Ok(())
  }

  async fn order_by_id(&self, id: i32) -> Result<Option<OrderWithItems>> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await?;
    match order {
      Some(order) => Ok(self.with_items(vec![order], None).await?.pop()),
      None => Ok(None),
    }
  }

  async fn order_by_payment_reference(&self, reference: &str) -> Result<Option<Order>> {
    Ok(
      sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE payment_reference = $1")
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn orders_for_user(&self, user_id: &str) -> Result<Vec<OrderWithItems>> {
    let orders = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC")
      .bind(user_id)
      .fetch_all(&self.pool)
      .await?;
    self.with_items(orders, None).await
  }

  async fn orders_for_seller(&self, seller_id: i32) -> Result<Vec<OrderWithItems>> {
    let orders = sqlx::query_as::<_, Order>(
      "SELECT * FROM orders WHERE id IN (SELECT order_id FROM order_items WHERE seller_id = $1) \
       ORDER BY created_at DESC, id DESC",
    )
    .bind(seller_id)
    .fetch_all(&self.pool)
    .await?;
    self.with_items(orders, Some(seller_id)).await
  }

  async fn list_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>> {
    Ok(
      sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE ($1::VARCHAR IS NULL OR status = $1) ORDER BY created_at DESC, id DESC",
      )
      .bind(status.map(OrderStatus::as_str))
      .fetch_all(&self.pool)
      .await?,
    )
  }

  #[instrument(name = "storage::settle_payment", skip(self))]
  async fn settle_payment(&self, order_id: i32, outcome: PaymentOutcome) -> Result<Order> {
    let mut tx = self.pool.begin().await?;
    let current = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
      .bind(order_id)
      .fetch_optional(&mut *tx)
      .await?
      .ok_or_else(|| AppError::not_found("Order", order_id))?;
    if current.payment_status != PaymentStatus::Pending {
      return Err(AppError::Conflict(format!("Payment for order {} is already settled", order_id)));
    }

    let (status, payment_status) = match outcome {
      PaymentOutcome::Succeeded if current.status == OrderStatus::Pending => (OrderStatus::Confirmed, PaymentStatus::Paid),
      PaymentOutcome::Succeeded => (current.status, PaymentStatus::Paid),
      PaymentOutcome::Failed => {
        sqlx::query(
          "UPDATE products p SET stock = p.stock + oi.quantity, updated_at = NOW() \
           FROM order_items oi WHERE oi.order_id = $1 AND oi.product_id = p.id",
        )
        .bind(order_id)
        .execute(&mut *tx)
        .await?;
        (OrderStatus::Cancelled, PaymentStatus::Failed)
      }
    };

    let order = sqlx::query_as::<_, Order>(
      "UPDATE orders SET status = $2, payment_status = $3, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(order_id)
    .bind(status.as_str())
    .bind(payment_status.as_str())
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(order)
  }

  async fn update_order_status(
    &self,
    order_id: i32,
    status: OrderStatus,
    payment_status: Option<PaymentStatus>,
  ) -> Result<Order> {
    sqlx::query_as::<_, Order>(
      "UPDATE orders SET status = $2, payment_status = COALESCE($3, payment_status), updated_at = NOW() \
       WHERE id = $1 RETURNING *",
    )
    .bind(order_id)
    .bind(status.as_str())
    .bind(payment_status.map(PaymentStatus::as_str))
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| AppError::not_found("Order", order_id))
  }
}

#[async_trait]
impl DeliveryStore for PgStorage {
  async fn create_delivery_boy(&self, agent: NewDeliveryBoy) -> Result<DeliveryBoy> {
    Ok(
      sqlx::query_as::<_, DeliveryBoy>(
        "INSERT INTO delivery_boys (user_id, name, phone, vehicle_type, vehicle_number) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
      )
      .bind(&agent.user_id)
      .bind(&agent.name)
      .bind(&agent.phone)
      .bind(&agent.vehicle_type)
      .bind(&agent.vehicle_number)
      .fetch_one(&self.pool)
      .await?,
    )
  }

  async fn delivery_boy_by_id(&self, id: i32) -> Result<Option<DeliveryBoy>> {
    Ok(
      sqlx::query_as::<_, DeliveryBoy>("SELECT * FROM delivery_boys WHERE id = $1")
        .bind(id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn delivery_boy_by_user(&self, user_id: &str) -> Result<Option<DeliveryBoy>> {
    Ok(
      sqlx::query_as::<_, DeliveryBoy>("SELECT * FROM delivery_boys WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn list_delivery_boys(&self, approval: Option<ApprovalStatus>) -> Result<Vec<DeliveryBoy>> {
    Ok(
      sqlx::query_as::<_, DeliveryBoy>(
        "SELECT * FROM delivery_boys WHERE ($1::VARCHAR IS NULL OR approval_status = $1) \
         ORDER BY created_at DESC, id DESC",
      )
      .bind(approval.map(ApprovalStatus::as_str))
      .fetch_all(&self.pool)
      .await?,
    )
  }

  async fn set_delivery_availability(&self, id: i32, is_available: bool) -> Result<DeliveryBoy> {
    sqlx::query_as::<_, DeliveryBoy>(
      "UPDATE delivery_boys SET is_available = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(is_available)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| AppError::not_found("Delivery agent", id))
  }

  async fn active_assignment_for_order(&self, order_id: i32) -> Result<Option<DeliveryAssignment>> {
    Ok(
      sqlx::query_as::<_, DeliveryAssignment>(
        "SELECT * FROM delivery_assignments WHERE order_id = $1 AND status <> $2",
      )
      .bind(order_id)
      .bind(DeliveryStatus::Delivered.as_str())
      .fetch_optional(&self.pool)
      .await?,
    )
  }

  #[instrument(name = "storage::create_assignment", skip_all, fields(order_id = assignment.order_id))]
  async fn create_assignment(&self, assignment: NewAssignment) -> Result<DeliveryAssignment> {
    let mut tx = self.pool.begin().await?;
    // Holding the agent row serialises concurrent assignments to one agent.
    let agent = sqlx::query_as::<_, DeliveryBoy>("SELECT * FROM delivery_boys WHERE id = $1 FOR UPDATE")
      .bind(assignment.delivery_boy_id)
      .fetch_optional(&mut *tx)
      .await?
      .ok_or_else(|| AppError::not_found("Delivery agent", assignment.delivery_boy_id))?;
    if !agent.approval.is_approved() {
      return Err(AppError::Conflict(format!("Delivery agent {} is not approved", agent.id)));
    }
    if !agent.is_available {
      return Err(AppError::Conflict(format!("Delivery agent {} is not available", agent.id)));
    }

    let row = sqlx::query_as::<_, DeliveryAssignment>(
      "INSERT INTO delivery_assignments (order_id, delivery_boy_id, status, delivery_fee_cents, notes, assigned_by) \
       VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(assignment.order_id)
    .bind(assignment.delivery_boy_id)
    .bind(DeliveryStatus::Pending.as_str())
    .bind(assignment.delivery_fee_cents)
    .bind(&assignment.notes)
    .bind(&assignment.assigned_by)
    .fetch_one(&mut *tx)
    .await?;
    sqlx::query("UPDATE delivery_boys SET is_available = FALSE, updated_at = NOW() WHERE id = $1")
      .bind(assignment.delivery_boy_id)
      .execute(&mut *tx)
      .await?;
    tx.commit().await?;
    Ok(row)
  }

  async fn assignment_by_id(&self, id: i32) -> Result<Option<DeliveryAssignment>> {
    Ok(
      sqlx::query_as::<_, DeliveryAssignment>("SELECT * FROM delivery_assignments WHERE id = $1")
        .bind(id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn assignments_for_delivery_boy(&self, delivery_boy_id: i32) -> Result<Vec<DeliveryAssignment>> {
    Ok(
      sqlx::query_as::<_, DeliveryAssignment>(
        "SELECT * FROM delivery_assignments WHERE delivery_boy_id = $1 ORDER BY assigned_at DESC, id DESC",
      )
      .bind(delivery_boy_id)
      .fetch_all(&self.pool)
      .await?,
    )
  }

  async fn advance_assignment(
    &self,
    id: i32,
    from: DeliveryStatus,
    to: DeliveryStatus,
    at: DateTime<Utc>,
  ) -> Result<DeliveryAssignment> {
    // Each status owns one timestamp column; only the matching one is touched.
    let sql = match to {
      DeliveryStatus::Pending => {
        "UPDATE delivery_assignments SET status = $2, assigned_at = $3 WHERE id = $1 AND status = $4 RETURNING *"
      }
      DeliveryStatus::Accepted => {
        "UPDATE delivery_assignments SET status = $2, accepted_at = $3 WHERE id = $1 AND status = $4 RETURNING *"
      }
      DeliveryStatus::PickedUp => {
        "UPDATE delivery_assignments SET status = $2, picked_up_at = $3 WHERE id = $1 AND status = $4 RETURNING *"
      }
      DeliveryStatus::OnTheWay => {
        "UPDATE delivery_assignments SET status = $2, on_the_way_at = $3 WHERE id = $1 AND status = $4 RETURNING *"
      }
      DeliveryStatus::Delivered => {
        "UPDATE delivery_assignments SET status = $2, delivered_at = $3 WHERE id = $1 AND status = $4 RETURNING *"
      }
    };
    let row = sqlx::query_as::<_, DeliveryAssignment>(sql)
      .bind(id)
      .bind(to.as_str())
      .bind(at)
      .bind(from.as_str())
      .fetch_optional(&self.pool)
      .await?;
    match row {
      Some(row) => Ok(row),
      None => Err(self.stale_or_missing("delivery_assignments", "Delivery assignment", id).await),
    }
  }

  #[instrument(name = "storage::finish_delivery", skip(self))]
  async fn finish_delivery(&self, id: i32, at: DateTime<Utc>) -> Result<DeliveryAssignment> {
    let mut tx = self.pool.begin().await?;
    let assignment = sqlx::query_as::<_, DeliveryAssignment>(
      "UPDATE delivery_assignments SET status = $2, delivered_at = $3 WHERE id = $1 AND status = $4 RETURNING *",
    )
    .bind(id)
    .bind(DeliveryStatus::Delivered.as_str())
    .bind(at)
    .bind(DeliveryStatus::OnTheWay.as_str())
    .fetch_optional(&mut *tx)
    .await?;
    let Some(assignment) = assignment else {
      drop(tx);
      return Err(self.stale_or_missing("delivery_assignments", "Delivery assignment", id).await);
    };

    let order = sqlx::query(
      "UPDATE orders SET status = $2, \
         payment_status = CASE WHEN payment_method = $3 THEN $4 ELSE payment_status END, updated_at = NOW() \
       WHERE id = $1",
    )
    .bind(assignment.order_id)
    .bind(OrderStatus::Delivered.as_str())
    .bind(PaymentMethod::Cod.as_str())
    .bind(PaymentStatus::Paid.as_str())
    .execute(&mut *tx)
    .await?;
    if order.rows_affected() == 0 {
      return Err(AppError::not_found("Order", assignment.order_id));
    }

    let agent = sqlx::query(
      "UPDATE delivery_boys SET is_available = TRUE, total_deliveries = total_deliveries + 1, updated_at = NOW() \
       WHERE id = $1",
    )
    .bind(assignment.delivery_boy_id)
    .execute(&mut *tx)
    .await?;
    if agent.rows_affected() == 0 {
      return Err(AppError::not_found("Delivery agent", assignment.delivery_boy_id));
    }

    tx.commit().await?;
    Ok(assignment)
  }
}

#[async_trait]
impl FoodStore for PgStorage {
  async fn create_food_vendor(&self, vendor: NewFoodVendor) -> Result<FoodVendor> {
    Ok(
      sqlx::query_as::<_, FoodVendor>(
        "INSERT INTO food_vendors (user_id, restaurant_name, cuisine, address, phone) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
      )
      .bind(&vendor.user_id)
      .bind(&vendor.restaurant_name)
      .bind(&vendor.cuisine)
      .bind(&vendor.address)
      .bind(&vendor.phone)
      .fetch_one(&self.pool)
      .await?,
    )
  }

  async fn food_vendor_by_id(&self, id: i32) -> Result<Option<FoodVendor>> {
    Ok(
      sqlx::query_as::<_, FoodVendor>("SELECT * FROM food_vendors WHERE id = $1")
        .bind(id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn food_vendor_by_user(&self, user_id: &str) -> Result<Option<FoodVendor>> {
    Ok(
      sqlx::query_as::<_, FoodVendor>("SELECT * FROM food_vendors WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn list_food_vendors(&self, approval: Option<ApprovalStatus>) -> Result<Vec<FoodVendor>> {
    Ok(
      sqlx::query_as::<_, FoodVendor>(
        "SELECT * FROM food_vendors WHERE ($1::VARCHAR IS NULL OR approval_status = $1) \
         ORDER BY created_at DESC, id DESC",
      )
      .bind(approval.map(ApprovalStatus::as_str))
      .fetch_all(&self.pool)
      .await?,
    )
  }

  async fn create_food_item(&self, item: NewFoodItem) -> Result<FoodItem> {
    Ok(
      sqlx::query_as::<_, FoodItem>(
        "INSERT INTO food_items (vendor_id, name, description, price_cents, is_veg) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
      )
      .bind(item.vendor_id)
      .bind(&item.name)
      .bind(&item.description)
      .bind(item.price_cents)
      .bind(item.is_veg)
      .fetch_one(&self.pool)
      .await?,
    )
  }

  async fn food_item_by_id(&self, id: i32) -> Result<Option<FoodItem>> {
    Ok(
      sqlx::query_as::<_, FoodItem>("SELECT * FROM food_items WHERE id = $1")
        .bind(id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn list_food_items(&self, filter: &FoodItemFilter) -> Result<Vec<FoodItem>> {
    Ok(
      sqlx::query_as::<_, FoodItem>(
        "SELECT * FROM food_items \
         WHERE ($1::INT IS NULL OR vendor_id = $1) \
           AND ($2::VARCHAR IS NULL OR approval_status = $2) \
           AND (NOT $3 OR is_available) \
         ORDER BY created_at DESC, id DESC",
      )
      .bind(filter.vendor_id)
      .bind(filter.approval.map(ApprovalStatus::as_str))
      .bind(filter.available_only)
      .fetch_all(&self.pool)
      .await?,
    )
  }

  async fn create_food_order(&self, order: NewFoodOrder) -> Result<FoodOrder> {
    Ok(
      sqlx::query_as::<_, FoodOrder>(
        "INSERT INTO food_orders (user_id, vendor_id, lines, subtotal_cents, delivery_fee_cents, total_cents, \
           status, delivery_address) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
      )
      .bind(&order.user_id)
      .bind(order.vendor_id)
      .bind(Json(&order.lines))
      .bind(order.subtotal_cents)
      .bind(order.delivery_fee_cents)
      .bind(order.total_cents)
      .bind(FoodOrderStatus::Pending.as_str())
      .bind(&order.delivery_address)
      .fetch_one(&self.pool)
      .await?,
    )
  }

  async fn food_order_by_id(&self, id: i32) -> Result<Option<FoodOrder>> {
    Ok(
      sqlx::query_as::<_, FoodOrder>("SELECT * FROM food_orders WHERE id = $1")
        .bind(id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn food_orders_for_user(&self, user_id: &str) -> Result<Vec<FoodOrder>> {
    Ok(
      sqlx::query_as::<_, FoodOrder>("SELECT * FROM food_orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?,
    )
  }

  async fn food_orders_for_vendor(&self, vendor_id: i32) -> Result<Vec<FoodOrder>> {
    Ok(
      sqlx::query_as::<_, FoodOrder>(
        "SELECT * FROM food_orders WHERE vendor_id = $1 ORDER BY created_at DESC, id DESC",
      )
      .bind(vendor_id)
      .fetch_all(&self.pool)
      .await?,
    )
  }

  async fn set_food_order_status(&self, id: i32, from: FoodOrderStatus, to: FoodOrderStatus) -> Result<FoodOrder> {
    let row = sqlx::query_as::<_, FoodOrder>(
      "UPDATE food_orders SET status = $2, updated_at = NOW() WHERE id = $1 AND status = $3 RETURNING *",
    )
    .bind(id)
    .bind(to.as_str())
    .bind(from.as_str())
    .fetch_optional(&self.pool)
    .await?;
    match row {
      Some(row) => Ok(row),
      None => Err(self.stale_or_missing("food_orders", "Food order", id).await),
    }
  }
}

#[async_trait]
impl ServiceStore for PgStorage {
  async fn create_service_provider(&self, provider: NewServiceProvider) -> Result<ServiceProvider> {
    Ok(
      sqlx::query_as::<_, ServiceProvider>(
        "INSERT INTO service_providers (user_id, business_name, service_type, description, phone, hourly_rate_cents) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
      )
      .bind(&provider.user_id)
      .bind(&provider.business_name)
      .bind(&provider.service_type)
      .bind(&provider.description)
      .bind(&provider.phone)
      .bind(provider.hourly_rate_cents)
      .fetch_one(&self.pool)
      .await?,
    )
  }

  async fn service_provider_by_id(&self, id: i32) -> Result<Option<ServiceProvider>> {
    Ok(
      sqlx::query_as::<_, ServiceProvider>("SELECT * FROM service_providers WHERE id = $1")
        .bind(id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn service_provider_by_user(&self, user_id: &str) -> Result<Option<ServiceProvider>> {
    Ok(
      sqlx::query_as::<_, ServiceProvider>("SELECT * FROM service_providers WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn list_service_providers(
    &self,
    approval: Option<ApprovalStatus>,
    service_type: Option<&str>,
  ) -> Result<Vec<ServiceProvider>> {
    Ok(
      sqlx::query_as::<_, ServiceProvider>(
        "SELECT * FROM service_providers \
         WHERE ($1::VARCHAR IS NULL OR approval_status = $1) \
           AND ($2::VARCHAR IS NULL OR LOWER(service_type) = LOWER($2)) \
         ORDER BY created_at DESC, id DESC",
      )
      .bind(approval.map(ApprovalStatus::as_str))
      .bind(service_type)
      .fetch_all(&self.pool)
      .await?,
    )
  }

  async fn create_booking(&self, booking: NewBooking) -> Result<ServiceBooking> {
    Ok(
      sqlx::query_as::<_, ServiceBooking>(
        "INSERT INTO service_bookings (user_id, provider_id, scheduled_at, address, notes, status) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
      )
      .bind(&booking.user_id)
      .bind(booking.provider_id)
      .bind(booking.scheduled_at)
      .bind(&booking.address)
      .bind(&booking.notes)
      .bind(BookingStatus::Pending.as_str())
      .fetch_one(&self.pool)
      .await?,
    )
  }

  async fn booking_by_id(&self, id: i32) -> Result<Option<ServiceBooking>> {
    Ok(
      sqlx::query_as::<_, ServiceBooking>("SELECT * FROM service_bookings WHERE id = $1")
        .bind(id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn bookings_for_user(&self, user_id: &str) -> Result<Vec<ServiceBooking>> {
    Ok(
      sqlx::query_as::<_, ServiceBooking>(
        "SELECT * FROM service_bookings WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
      )
      .bind(user_id)
      .fetch_all(&self.pool)
      .await?,
    )
  }

  async fn bookings_for_provider(&self, provider_id: i32) -> Result<Vec<ServiceBooking>> {
    Ok(
      sqlx::query_as::<_, ServiceBooking>(
        "SELECT * FROM service_bookings WHERE provider_id = $1 ORDER BY created_at DESC, id DESC",
      )
      .bind(provider_id)
      .fetch_all(&self.pool)
      .await?,
    )
  }

  async fn set_booking_status(&self, id: i32, from: BookingStatus, to: BookingStatus) -> Result<ServiceBooking> {
    let row = sqlx::query_as::<_, ServiceBooking>(
      "UPDATE service_bookings SET status = $2, updated_at = NOW() WHERE id = $1 AND status = $3 RETURNING *",
    )
    .bind(id)
    .bind(to.as_str())
    .bind(from.as_str())
    .fetch_optional(&self.pool)
    .await?;
    match row {
      Some(row) => Ok(row),
      None => Err(self.stale_or_missing("service_bookings", "Booking", id).await),
    }
  }
}

/// Row shape shared by every approvable table once joined to its owner.
#[derive(sqlx::FromRow)]
struct ApprovalRow {
  display_name: String,
  owner_user_id: String,
  #[sqlx(flatten)]
  approval: Approval,
}

fn approval_lookup_sql(subject: ApprovalSubject) -> &'static str {
  match subject {
    ApprovalSubject::Vendor => {
      "SELECT business_name AS display_name, user_id AS owner_user_id, \
         approval_status, rejection_reason, approved_by, approved_at \
       FROM sellers WHERE id = $1"
    }
    ApprovalSubject::Product => {
      "SELECT p.name AS display_name, s.user_id AS owner_user_id, \
         p.approval_status, p.rejection_reason, p.approved_by, p.approved_at \
       FROM products p JOIN sellers s ON s.id = p.seller_id WHERE p.id = $1"
    }
    ApprovalSubject::FoodVendor => {
      "SELECT restaurant_name AS display_name, user_id AS owner_user_id, \
         approval_status, rejection_reason, approved_by, approved_at \
       FROM food_vendors WHERE id = $1"
    }
    ApprovalSubject::FoodItem => {
      "SELECT i.name AS display_name, v.user_id AS owner_user_id, \
         i.approval_status, i.rejection_reason, i.approved_by, i.approved_at \
       FROM food_items i JOIN food_vendors v ON v.id = i.vendor_id WHERE i.id = $1"
    }
    ApprovalSubject::ServiceProvider => {
      "SELECT business_name AS display_name, user_id AS owner_user_id, \
         approval_status, rejection_reason, approved_by, approved_at \
       FROM service_providers WHERE id = $1"
    }
    ApprovalSubject::DeliveryBoy => {
      "SELECT name AS display_name, user_id AS owner_user_id, \
         approval_status, rejection_reason, approved_by, approved_at \
       FROM delivery_boys WHERE id = $1"
    }
  }
}

fn approval_table(subject: ApprovalSubject) -> &'static str {
  match subject {
    ApprovalSubject::Vendor => "sellers",
    ApprovalSubject::Product => "products",
    ApprovalSubject::FoodVendor => "food_vendors",
    ApprovalSubject::FoodItem => "food_items",
    ApprovalSubject::ServiceProvider => "service_providers",
    ApprovalSubject::DeliveryBoy => "delivery_boys",
  }
}

#[async_trait]
impl ApprovalStore for PgStorage {
  async fn approval_target(&self, subject: ApprovalSubject, id: i32) -> Result<Option<ApprovalTarget>> {
    let row = sqlx::query_as::<_, ApprovalRow>(approval_lookup_sql(subject))
      .bind(id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(row.map(|row| ApprovalTarget {
      subject,
      id,
      display_name: row.display_name,
      owner_user_id: row.owner_user_id,
      approval: row.approval,
    }))
  }

  async fn record_approval(&self, subject: ApprovalSubject, id: i32, approval: &Approval) -> Result<()> {
    // Table names come from a closed enum, never from input.
    let sql = format!(
      "UPDATE {} SET approval_status = $2, rejection_reason = $3, approved_by = $4, approved_at = $5, \
         updated_at = NOW() WHERE id = $1",
      approval_table(subject)
    );
    let result = sqlx::query(&sql)
      .bind(id)
      .bind(approval.approval_status.as_str())
      .bind(&approval.rejection_reason)
      .bind(&approval.approved_by)
      .bind(approval.approved_at)
      .execute(&self.pool)
      .await?;
    if result.rows_affected() == 0 {
      return Err(AppError::not_found(subject.label(), id));
    }
    Ok(())
  }
}

#[async_trait]
impl Storage for PgStorage {
  fn backend_name(&self) -> &'static str {
    "postgres"
  }

  async fn ping(&self) -> Result<()> {
    sqlx::query("SELECT 1").execute(&self.pool).await?;
    Ok(())
  }
}
