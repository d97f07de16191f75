// src/storage/memory.rs

//! In-process storage for development without a database and for tests.
//!
//! All tables sit behind one `parking_lot::RwLock`. Every operation takes the
//! lock once inside a synchronous closure, so a guard never lives across an
//! await point and multi-row changes (order placement, payment reversal) are
//! atomic the same way a transaction would make them.

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
use parking_lot::RwLock;

#[derive(Default)]
struct Tables {
  next_id: i32,
  users: Vec<User>,
  sellers: Vec<Seller>,
  categories: Vec<Category>,
  products: Vec<Product>,
  cart_items: Vec<CartItem>,
  orders: Vec<Order>,
  order_items: Vec<OrderItem>,
  delivery_boys: Vec<DeliveryBoy>,
  assignments: Vec<DeliveryAssignment>,
  food_vendors: Vec<FoodVendor>,
  food_items: Vec<FoodItem>,
  food_orders: Vec<FoodOrder>,
  service_providers: Vec<ServiceProvider>,
  bookings: Vec<ServiceBooking>,
}

impl Tables {
  fn next_id(&mut self) -> i32 {
    self.next_id += 1;
    self.next_id
  }

  fn order_with_items(&self, order: &Order) -> OrderWithItems {
    OrderWithItems {
      order: order.clone(),
      items: self.order_items.iter().filter(|i| i.order_id == order.id).cloned().collect(),
    }
  }

  fn product_mut(&mut self, id: i32) -> Result<&mut Product> {
    self
      .products
      .iter_mut()
      .find(|p| p.id == id)
      .ok_or_else(|| AppError::not_found("Product", id))
  }

  fn order_mut(&mut self, id: i32) -> Result<&mut Order> {
    self
      .orders
      .iter_mut()
      .find(|o| o.id == id)
      .ok_or_else(|| AppError::not_found("Order", id))
  }

  fn delivery_boy_mut(&mut self, id: i32) -> Result<&mut DeliveryBoy> {
    self
      .delivery_boys
      .iter_mut()
      .find(|d| d.id == id)
      .ok_or_else(|| AppError::not_found("Delivery agent", id))
  }
}

/// Newest first, the way the SQL queries order by `created_at DESC`.
fn newest_first<T: Clone>(rows: impl DoubleEndedIterator<Item = T>) -> Vec<T> {
  rows.rev().collect()
}

fn conflict(what: &str) -> AppError {
  AppError::Conflict(format!("{} already exists", what))
}

#[derive(Default)]
pub struct MemoryStorage {
  tables: RwLock<Tables>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
    f(&self.tables.read())
  }

  fn write<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
    f(&mut self.tables.write())
  }
}

#[async_trait]
impl UserStore for MemoryStorage {
  async fn find_user(&self, id: &str) -> Result<Option<User>> {
    Ok(self.read(|t| t.users.iter().find(|u| u.id == id).cloned()))
  }

  async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
    Ok(self.read(|t| t.users.iter().find(|u| u.email == email).cloned()))
  }

  async fn create_user(&self, new_user: NewUser) -> Result<User> {
    self.write(|t| {
      if t.users.iter().any(|u| u.email == new_user.email || u.id == new_user.id) {
        return Err(conflict("A user with this email"));
      }
      let now = Utc::now();
      let user = User {
        id: new_user.id,
        email: new_user.email,
        first_name: new_user.first_name,
        last_name: new_user.last_name,
        profile_image_url: None,
        is_admin: new_user.is_admin,
        password_hash: new_user.password_hash,
        created_at: now,
        updated_at: now,
      };
      t.users.push(user.clone());
      Ok(user)
    })
  }

  async fn upsert_user(&self, new_user: NewUser) -> Result<User> {
    self.write(|t| {
      if t.users.iter().any(|u| u.email == new_user.email && u.id != new_user.id) {
        return Err(conflict("A user with this email"));
      }
      let now = Utc::now();
      if let Some(existing) = t.users.iter_mut().find(|u| u.id == new_user.id) {
        existing.email = new_user.email;
        existing.first_name = new_user.first_name;
        existing.last_name = new_user.last_name;
        existing.is_admin = new_user.is_admin;
        if new_user.password_hash.is_some() {
          existing.password_hash = new_user.password_hash;
        }
        existing.updated_at = now;
        return Ok(existing.clone());
      }
      let user = User {
        id: new_user.id,
        email: new_user.email,
        first_name: new_user.first_name,
        last_name: new_user.last_name,
        profile_image_url: None,
        is_admin: new_user.is_admin,
        password_hash: new_user.password_hash,
        created_at: now,
        updated_at: now,
      };
      t.users.push(user.clone());
      Ok(user)
    })
  }
}

#[async_trait]
impl SellerStore for MemoryStorage {
  async fn create_seller(&self, user_id: &str, profile: SellerProfile) -> Result<Seller> {
    self.write(|t| {
      if t.sellers.iter().any(|s| s.user_id == user_id) {
        return Err(conflict("A seller profile for this user"));
      }
      let now = Utc::now();
      let seller = Seller {
        id: t.next_id(),
        user_id: user_id.to_string(),
        profile,
        approval: Approval::pending(),
        created_at: now,
        updated_at: now,
      };
      t.sellers.push(seller.clone());
      Ok(seller)
    })
  }

  async fn seller_by_id(&self, id: i32) -> Result<Option<Seller>> {
    Ok(self.read(|t| t.sellers.iter().find(|s| s.id == id).cloned()))
  }

  async fn seller_by_user(&self, user_id: &str) -> Result<Option<Seller>> {
    Ok(self.read(|t| t.sellers.iter().find(|s| s.user_id == user_id).cloned()))
  }

  async fn update_seller_profile(&self, id: i32, profile: SellerProfile) -> Result<Seller> {
    self.write(|t| {
      let seller = t
        .sellers
        .iter_mut()
        .find(|s| s.id == id)
        .ok_or_else(|| AppError::not_found("Seller", id))?;
      seller.profile = profile;
      seller.updated_at = Utc::now();
      Ok(seller.clone())
    })
  }

  async fn list_sellers(&self, approval: Option<ApprovalStatus>) -> Result<Vec<Seller>> {
    Ok(self.read(|t| {
      newest_first(
        t.sellers
          .iter()
          .filter(|s| approval.map_or(true, |status| s.approval.approval_status == status))
          .cloned(),
      )
    }))
  }
}

#[async_trait]
impl CatalogStore for MemoryStorage {
  async fn list_categories(&self, active_only: bool) -> Result<Vec<Category>> {
    let mut categories: Vec<Category> = self.read(|t| {
      t.categories
        .iter()
        .filter(|c| !active_only || c.is_active)
        .cloned()
        .collect()
    });
    categories.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(categories)
  }

  async fn category_by_id(&self, id: i32) -> Result<Option<Category>> {
    Ok(self.read(|t| t.categories.iter().find(|c| c.id == id).cloned()))
  }

  async fn create_category(&self, category: NewCategory) -> Result<Category> {
    self.write(|t| {
      if t.categories.iter().any(|c| c.slug == category.slug) {
        return Err(conflict("A category with this slug"));
      }
      let row = Category {
        id: t.next_id(),
        name: category.name,
        slug: category.slug,
        description: category.description,
        image_url: category.image_url,
        is_active: true,
        created_at: Utc::now(),
      };
      t.categories.push(row.clone());
      Ok(row)
    })
  }

  async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
    Ok(self.read(|t| newest_first(t.products.iter().filter(|p| filter.matches(p)).cloned())))
  }

  async fn product_by_id(&self, id: i32) -> Result<Option<Product>> {
    Ok(self.read(|t| t.products.iter().find(|p| p.id == id).cloned()))
  }

  async fn products_by_ids(&self, ids: &[i32]) -> Result<Vec<Product>> {
    Ok(self.read(|t| t.products.iter().filter(|p| ids.contains(&p.id)).cloned().collect()))
  }

  async fn create_product(&self, seller_id: i32, listing: ProductListing) -> Result<Product> {
    self.write(|t| {
      if !t.categories.iter().any(|c| c.id == listing.category_id) {
        return Err(AppError::Validation(format!("Category {} does not exist", listing.category_id)));
      }
      if listing.sku.is_some() && t.products.iter().any(|p| p.listing.sku == listing.sku) {
        return Err(conflict("A product with this SKU"));
      }
      let now = Utc::now();
      let product = Product {
        id: t.next_id(),
        seller_id,
        listing,
        is_active: true,
        rating: 0.0,
        review_count: 0,
        approval: Approval::pending(),
        created_at: now,
        updated_at: now,
      };
      t.products.push(product.clone());
      Ok(product)
    })
  }

  async fn update_product(&self, id: i32, listing: ProductListing) -> Result<Product> {
    self.write(|t| {
      if listing.sku.is_some() && t.products.iter().any(|p| p.id != id && p.listing.sku == listing.sku) {
        return Err(conflict("A product with this SKU"));
      }
      let product = t.product_mut(id)?;
      product.listing = listing;
      product.updated_at = Utc::now();
      Ok(product.clone())
    })
  }

  async fn deactivate_product(&self, id: i32) -> Result<()> {
    self.write(|t| {
      let product = t.product_mut(id)?;
      product.is_active = false;
      product.updated_at = Utc::now();
      t.cart_items.retain(|item| item.product_id != id);
      Ok(())
    })
  }
}

#[async_trait]
impl CartStore for MemoryStorage {
  async fn cart_lines(&self, user_id: &str) -> Result<Vec<CartLine>> {
    Ok(self.read(|t| {
      t.cart_items
        .iter()
        .filter(|item| item.user_id == user_id)
        .filter_map(|item| {
          let product = t.products.iter().find(|p| p.id == item.product_id)?;
          Some(CartLine {
            item: item.clone(),
            product: product.clone(),
          })
        })
        .collect()
    }))
  }

  async fn cart_item(&self, id: i32) -> Result<Option<CartItem>> {
    Ok(self.read(|t| t.cart_items.iter().find(|i| i.id == id).cloned()))
  }

  async fn cart_item_for(&self, user_id: &str, product_id: i32) -> Result<Option<CartItem>> {
    Ok(self.read(|t| {
      t.cart_items
        .iter()
        .find(|i| i.user_id == user_id && i.product_id == product_id)
        .cloned()
    }))
  }

  async fn add_to_cart(&self, user_id: &str, product_id: i32, quantity: i32) -> Result<CartItem> {
    self.write(|t| {
      let available = t
        .products
        .iter()
        .find(|p| p.id == product_id)
        .map(|p| p.listing.stock)
        .ok_or_else(|| AppError::not_found("Product", product_id))?;
      let held = t
        .cart_items
        .iter()
        .find(|i| i.user_id == user_id && i.product_id == product_id)
        .map_or(0, |i| i.quantity);
      if held + quantity > available {
        return Err(insufficient_stock(available));
      }

      let now = Utc::now();
      if let Some(item) = t
        .cart_items
        .iter_mut()
        .find(|i| i.user_id == user_id && i.product_id == product_id)
      {
        item.quantity += quantity;
        item.updated_at = now;
        return Ok(item.clone());
      }
      let item = CartItem {
        id: t.next_id(),
        user_id: user_id.to_string(),
        product_id,
        quantity,
        created_at: now,
        updated_at: now,
      };
      t.cart_items.push(item.clone());
      Ok(item)
    })
  }

  async fn set_cart_quantity(&self, id: i32, quantity: i32) -> Result<CartItem> {
    self.write(|t| {
      let item = t
        .cart_items
        .iter_mut()
        .find(|i| i.id == id)
        .ok_or_else(|| AppError::not_found("Cart item", id))?;
      item.quantity = quantity;
      item.updated_at = Utc::now();
      Ok(item.clone())
    })
  }

  async fn remove_cart_item(&self, id: i32) -> Result<bool> {
    Ok(self.write(|t| {
      let before = t.cart_items.len();
      t.cart_items.retain(|i| i.id != id);
      t.cart_items.len() != before
    }))
  }

  async fn clear_cart(&self, user_id: &str) -> Result<()> {
    self.write(|t| t.cart_items.retain(|i| i.user_id != user_id));
    Ok(())
  }
}

#[async_trait]
impl OrderStore for MemoryStorage {
  async fn place_order(&self, order: NewOrder) -> Result<OrderWithItems> {
    self.write(|t| {
      if t.orders.iter().any(|o| o.order_number == order.order_number) {
        return Err(conflict("An order with this number"));
      }
      for line in &order.lines {
        let product = t
          .products
          .iter()
          .find(|p| p.id == line.product_id)
          .ok_or_else(|| AppError::not_found("Product", line.product_id))?;
        if product.listing.stock < line.quantity {
          return Err(AppError::Validation(format!(
            "Insufficient stock for {}",
            product.listing.name
          )));
        }
      }

      let now = Utc::now();
      for line in &order.lines {
        let product = t.product_mut(line.product_id)?;
        product.listing.stock -= line.quantity;
        product.updated_at = now;
      }

      let order_id = t.next_id();
      let row = Order {
        id: order_id,
        user_id: order.user_id,
        order_number: order.order_number,
        status: order.status,
        subtotal_cents: order.subtotal_cents,
        tax_cents: order.tax_cents,
        shipping_cents: order.shipping_cents,
        total_cents: order.total_cents,
        payment_method: order.payment_method,
        payment_status: PaymentStatus::Pending,
        payment_reference: None,
        shipping_address: order.shipping_address,
        created_at: now,
        updated_at: now,
      };
      let mut items = Vec::with_capacity(order.lines.len());
      for line in order.lines {
        items.push(OrderItem {
          id: t.next_id(),
          order_id,
          product_id: line.product_id,
          seller_id: line.seller_id,
          product_name: line.product_name,
          quantity: line.quantity,
          unit_price_cents: line.unit_price_cents,
          total_cents: line.unit_price_cents * i64::from(line.quantity),
        });
      }
      t.orders.push(row.clone());
      t.order_items.extend(items.iter().cloned());
      Ok(OrderWithItems { order: row, items })
    })
  }

  async fn set_payment_reference(&self, order_id: i32, reference: &str) -> Result<()> {
    self.write(|t| {
      let order = t.order_mut(order_id)?;
      order.payment_reference = Some(reference.to_string());
      order.updated_at = Utc::now();
      Ok(())
    })
  }

  async fn order_by_id(&self, id: i32) -> Result<Option<OrderWithItems>> {
    Ok(self.read(|t| t.orders.iter().find(|o| o.id == id).map(|o| t.order_with_items(o))))
  }

  async fn order_by_payment_reference(&self, reference: &str) -> Result<Option<Order>> {
    Ok(self.read(|t| {
      t.orders
        .iter()
        .find(|o| o.payment_reference.as_deref() == Some(reference))
        .cloned()
    }))
  }

  async fn orders_for_user(&self, user_id: &str) -> Result<Vec<OrderWithItems>> {
    Ok(self.read(|t| {
      newest_first(
        t.orders
          .iter()
          .filter(|o| o.user_id == user_id)
          .map(|o| t.order_with_items(o)),
      )
    }))
  }

  async fn orders_for_seller(&self, seller_id: i32) -> Result<Vec<OrderWithItems>> {
    Ok(self.read(|t| {
      newest_first(t.orders.iter().filter_map(|o| {
        let items: Vec<OrderItem> = t
          .order_items
          .iter()
          .filter(|i| i.order_id == o.id && i.seller_id == seller_id)
          .cloned()
          .collect();
        (!items.is_empty()).then(|| OrderWithItems { order: o.clone(), items })
      }))
    }))
  }

  async fn list_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>> {
    Ok(self.read(|t| {
      newest_first(
        t.orders
          .iter()
          .filter(|o| status.map_or(true, |s| o.status == s))
          .cloned(),
      )
    }))
  }

  async fn settle_payment(&self, order_id: i32, outcome: PaymentOutcome) -> Result<Order> {
    self.write(|t| {
      let now = Utc::now();
      {
        let order = t.order_mut(order_id)?;
        if order.payment_status != PaymentStatus::Pending {
          return Err(AppError::Conflict(format!("Payment for order {} is already settled", order_id)));
        }
      }

      if outcome == PaymentOutcome::Failed {
        let restock: Vec<(i32, i32)> = t
          .order_items
          .iter()
          .filter(|i| i.order_id == order_id)
          .map(|i| (i.product_id, i.quantity))
          .collect();
        for (product_id, quantity) in restock {
          let product = t.product_mut(product_id)?;
          product.listing.stock += quantity;
          product.updated_at = now;
        }
      }

      let order = t.order_mut(order_id)?;
      match outcome {
        PaymentOutcome::Succeeded => {
          order.payment_status = PaymentStatus::Paid;
          if order.status == OrderStatus::Pending {
            order.status = OrderStatus::Confirmed;
          }
        }
        PaymentOutcome::Failed => {
          order.payment_status = PaymentStatus::Failed;
          order.status = OrderStatus::Cancelled;
        }
      }
      order.updated_at = now;
      Ok(order.clone())
    })
  }

  async fn update_order_status(
    &self,
    order_id: i32,
    status: OrderStatus,
    payment_status: Option<PaymentStatus>,
  ) -> Result<Order> {
    self.write(|t| {
      let order = t.order_mut(order_id)?;
      order.status = status;
      if let Some(payment_status) = payment_status {
        order.payment_status = payment_status;
      }
      order.updated_at = Utc::now();
      Ok(order.clone())
    })
  }
}

#[async_trait]
impl DeliveryStore for MemoryStorage {
  async fn create_delivery_boy(&self, agent: NewDeliveryBoy) -> Result<DeliveryBoy> {
    self.write(|t| {
      if t.delivery_boys.iter().any(|d| d.user_id == agent.user_id) {
        return Err(conflict("A delivery profile for this user"));
      }
      let now = Utc::now();
      let row = DeliveryBoy {
        id: t.next_id(),
        user_id: agent.user_id,
        name: agent.name,
        phone: agent.phone,
        vehicle_type: agent.vehicle_type,
        vehicle_number: agent.vehicle_number,
        is_available: true,
        total_deliveries: 0,
        approval: Approval::pending(),
        created_at: now,
        updated_at: now,
      };
      t.delivery_boys.push(row.clone());
      Ok(row)
    })
  }

  async fn delivery_boy_by_id(&self, id: i32) -> Result<Option<DeliveryBoy>> {
    Ok(self.read(|t| t.delivery_boys.iter().find(|d| d.id == id).cloned()))
  }

  async fn delivery_boy_by_user(&self, user_id: &str) -> Result<Option<DeliveryBoy>> {
    Ok(self.read(|t| t.delivery_boys.iter().find(|d| d.user_id == user_id).cloned()))
  }

  async fn list_delivery_boys(&self, approval: Option<ApprovalStatus>) -> Result<Vec<DeliveryBoy>> {
    Ok(self.read(|t| {
      newest_first(
        t.delivery_boys
          .iter()
          .filter(|d| approval.map_or(true, |s| d.approval.approval_status == s))
          .cloned(),
      )
    }))
  }

  async fn set_delivery_availability(&self, id: i32, is_available: bool) -> Result<DeliveryBoy> {
    self.write(|t| {
      let agent = t.delivery_boy_mut(id)?;
      agent.is_available = is_available;
      agent.updated_at = Utc::now();
      Ok(agent.clone())
    })
  }

  async fn active_assignment_for_order(&self, order_id: i32) -> Result<Option<DeliveryAssignment>> {
    Ok(self.read(|t| {
      t.assignments
        .iter()
        .find(|a| a.order_id == order_id && a.is_active())
        .cloned()
    }))
  }

  async fn create_assignment(&self, assignment: NewAssignment) -> Result<DeliveryAssignment> {
    self.write(|t| {
      if t
        .assignments
        .iter()
        .any(|a| a.order_id == assignment.order_id && a.is_active())
      {
        return Err(AppError::Conflict(format!(
          "Order {} already has an active delivery assignment",
          assignment.order_id
        )));
      }
      let now = Utc::now();
      let agent = t.delivery_boy_mut(assignment.delivery_boy_id)?;
      if !agent.approval.is_approved() {
        return Err(AppError::Conflict(format!("Delivery agent {} is not approved", agent.id)));
      }
      if !agent.is_available {
        return Err(AppError::Conflict(format!("Delivery agent {} is not available", agent.id)));
      }
      agent.is_available = false;
      agent.updated_at = now;

      let row = DeliveryAssignment {
        id: t.next_id(),
        order_id: assignment.order_id,
        delivery_boy_id: assignment.delivery_boy_id,
        status: DeliveryStatus::Pending,
        delivery_fee_cents: assignment.delivery_fee_cents,
        notes: assignment.notes,
        assigned_by: Some(assignment.assigned_by),
        assigned_at: now,
        accepted_at: None,
        picked_up_at: None,
        on_the_way_at: None,
        delivered_at: None,
      };
      t.assignments.push(row.clone());
      Ok(row)
    })
  }

  async fn assignment_by_id(&self, id: i32) -> Result<Option<DeliveryAssignment>> {
    Ok(self.read(|t| t.assignments.iter().find(|a| a.id == id).cloned()))
  }

  async fn assignments_for_delivery_boy(&self, delivery_boy_id: i32) -> Result<Vec<DeliveryAssignment>> {
    Ok(self.read(|t| {
      newest_first(
        t.assignments
          .iter()
          .filter(|a| a.delivery_boy_id == delivery_boy_id)
          .cloned(),
      )
    }))
  }

  async fn advance_assignment(
    &self,
    id: i32,
    from: DeliveryStatus,
    to: DeliveryStatus,
    at: DateTime<Utc>,
  ) -> Result<DeliveryAssignment> {
    self.write(|t| {
      let assignment = t
        .assignments
        .iter_mut()
        .find(|a| a.id == id)
        .ok_or_else(|| AppError::not_found("Delivery assignment", id))?;
      if assignment.status != from {
        return Err(stale_status("Delivery assignment", id, assignment.status));
      }
      assignment.stamp(to, at);
      Ok(assignment.clone())
    })
  }

  async fn finish_delivery(&self, id: i32, at: DateTime<Utc>) -> Result<DeliveryAssignment> {
    self.write(|t| {
      // Resolve every row before touching any of them.
      let ai = t
        .assignments
        .iter()
        .position(|a| a.id == id)
        .ok_or_else(|| AppError::not_found("Delivery assignment", id))?;
      let (order_id, agent_id, status) = {
        let assignment = &t.assignments[ai];
        (assignment.order_id, assignment.delivery_boy_id, assignment.status)
      };
      if status != DeliveryStatus::OnTheWay {
        return Err(stale_status("Delivery assignment", id, status));
      }
      let oi = t
        .orders
        .iter()
        .position(|o| o.id == order_id)
        .ok_or_else(|| AppError::not_found("Order", order_id))?;
      let di = t
        .delivery_boys
        .iter()
        .position(|d| d.id == agent_id)
        .ok_or_else(|| AppError::not_found("Delivery agent", agent_id))?;

      let order = &mut t.orders[oi];
      order.status = OrderStatus::Delivered;
      if order.payment_method == PaymentMethod::Cod {
        order.payment_status = PaymentStatus::Paid;
      }
      order.updated_at = at;

      let agent = &mut t.delivery_boys[di];
      agent.is_available = true;
      agent.total_deliveries += 1;
      agent.updated_at = at;

      let assignment = &mut t.assignments[ai];
      assignment.stamp(DeliveryStatus::Delivered, at);
      Ok(assignment.clone())
    })
  }
}

#[async_trait]
impl FoodStore for MemoryStorage {
  async fn create_food_vendor(&self, vendor: NewFoodVendor) -> Result<FoodVendor> {
    self.write(|t| {
      if t.food_vendors.iter().any(|v| v.user_id == vendor.user_id) {
        return Err(conflict("A food vendor profile for this user"));
      }
      let now = Utc::now();
      let row = FoodVendor {
        id: t.next_id(),
        user_id: vendor.user_id,
        restaurant_name: vendor.restaurant_name,
        cuisine: vendor.cuisine,
        address: vendor.address,
        phone: vendor.phone,
        approval: Approval::pending(),
        created_at: now,
        updated_at: now,
      };
      t.food_vendors.push(row.clone());
      Ok(row)
    })
  }

  async fn food_vendor_by_id(&self, id: i32) -> Result<Option<FoodVendor>> {
    Ok(self.read(|t| t.food_vendors.iter().find(|v| v.id == id).cloned()))
  }

  async fn food_vendor_by_user(&self, user_id: &str) -> Result<Option<FoodVendor>> {
    Ok(self.read(|t| t.food_vendors.iter().find(|v| v.user_id == user_id).cloned()))
  }

  async fn list_food_vendors(&self, approval: Option<ApprovalStatus>) -> Result<Vec<FoodVendor>> {
    Ok(self.read(|t| {
      newest_first(
        t.food_vendors
          .iter()
          .filter(|v| approval.map_or(true, |s| v.approval.approval_status == s))
          .cloned(),
      )
    }))
  }

  async fn create_food_item(&self, item: NewFoodItem) -> Result<FoodItem> {
    self.write(|t| {
      if !t.food_vendors.iter().any(|v| v.id == item.vendor_id) {
        return Err(AppError::Validation(format!("Food vendor {} does not exist", item.vendor_id)));
      }
      let now = Utc::now();
      let row = FoodItem {
        id: t.next_id(),
        vendor_id: item.vendor_id,
        name: item.name,
        description: item.description,
        price_cents: item.price_cents,
        is_veg: item.is_veg,
        is_available: true,
        approval: Approval::pending(),
        created_at: now,
        updated_at: now,
      };
      t.food_items.push(row.clone());
      Ok(row)
    })
  }

  async fn food_item_by_id(&self, id: i32) -> Result<Option<FoodItem>> {
    Ok(self.read(|t| t.food_items.iter().find(|i| i.id == id).cloned()))
  }

  async fn list_food_items(&self, filter: &FoodItemFilter) -> Result<Vec<FoodItem>> {
    Ok(self.read(|t| newest_first(t.food_items.iter().filter(|i| filter.matches(i)).cloned())))
  }

  async fn create_food_order(&self, order: NewFoodOrder) -> Result<FoodOrder> {
    self.write(|t| {
      let now = Utc::now();
      let row = FoodOrder {
        id: t.next_id(),
        user_id: order.user_id,
        vendor_id: order.vendor_id,
        lines: order.lines,
        subtotal_cents: order.subtotal_cents,
        delivery_fee_cents: order.delivery_fee_cents,
        total_cents: order.total_cents,
        status: FoodOrderStatus::Pending,
        delivery_address: order.delivery_address,
        created_at: now,
        updated_at: now,
      };
      t.food_orders.push(row.clone());
      Ok(row)
    })
  }

  async fn food_order_by_id(&self, id: i32) -> Result<Option<FoodOrder>> {
    Ok(self.read(|t| t.food_orders.iter().find(|o| o.id == id).cloned()))
  }

  async fn food_orders_for_user(&self, user_id: &str) -> Result<Vec<FoodOrder>> {
    Ok(self.read(|t| newest_first(t.food_orders.iter().filter(|o| o.user_id == user_id).cloned())))
  }

  async fn food_orders_for_vendor(&self, vendor_id: i32) -> Result<Vec<FoodOrder>> {
    Ok(self.read(|t| newest_first(t.food_orders.iter().filter(|o| o.vendor_id == vendor_id).cloned())))
  }

  async fn set_food_order_status(&self, id: i32, from: FoodOrderStatus, to: FoodOrderStatus) -> Result<FoodOrder> {
    self.write(|t| {
      let order = t
        .food_orders
        .iter_mut()
        .find(|o| o.id == id)
        .ok_or_else(|| AppError::not_found("Food order", id))?;
      if order.status != from {
        return Err(stale_status("Food order", id, order.status));
      }
      order.status = to;
      order.updated_at = Utc::now();
      Ok(order.clone())
    })
  }
}

#[async_trait]
impl ServiceStore for MemoryStorage {
  async fn create_service_provider(&self, provider: NewServiceProvider) -> Result<ServiceProvider> {
    self.write(|t| {
      if t.service_providers.iter().any(|p| p.user_id == provider.user_id) {
        return Err(conflict("A service provider profile for this user"));
      }
      let now = Utc::now();
      let row = ServiceProvider {
        id: t.next_id(),
        user_id: provider.user_id,
        business_name: provider.business_name,
        service_type: provider.service_type,
        description: provider.description,
        phone: provider.phone,
        hourly_rate_cents: provider.hourly_rate_cents,
        approval: Approval::pending(),
        created_at: now,
        updated_at: now,
      };
      t.service_providers.push(row.clone());
      Ok(row)
    })
  }

  async fn service_provider_by_id(&self, id: i32) -> Result<Option<ServiceProvider>> {
    Ok(self.read(|t| t.service_providers.iter().find(|p| p.id == id).cloned()))
  }

  async fn service_provider_by_user(&self, user_id: &str) -> Result<Option<ServiceProvider>> {
    Ok(self.read(|t| t.service_providers.iter().find(|p| p.user_id == user_id).cloned()))
  }

  async fn list_service_providers(
    &self,
    approval: Option<ApprovalStatus>,
    service_type: Option<&str>,
  ) -> Result<Vec<ServiceProvider>> {
    Ok(self.read(|t| {
      newest_first(
        t.service_providers
          .iter()
          .filter(|p| approval.map_or(true, |s| p.approval.approval_status == s))
          .filter(|p| service_type.map_or(true, |kind| p.service_type.eq_ignore_ascii_case(kind)))
          .cloned(),
      )
    }))
  }

  async fn create_booking(&self, booking: NewBooking) -> Result<ServiceBooking> {
    self.write(|t| {
      let now = Utc::now();
      let row = ServiceBooking {
        id: t.next_id(),
        user_id: booking.user_id,
        provider_id: booking.provider_id,
        scheduled_at: booking.scheduled_at,
        address: booking.address,
        notes: booking.notes,
        status: BookingStatus::Pending,
        created_at: now,
        updated_at: now,
      };
      t.bookings.push(row.clone());
      Ok(row)
    })
  }

  async fn booking_by_id(&self, id: i32) -> Result<Option<ServiceBooking>> {
    Ok(self.read(|t| t.bookings.iter().find(|b| b.id == id).cloned()))
  }

  async fn bookings_for_user(&self, user_id: &str) -> Result<Vec<ServiceBooking>> {
    Ok(self.read(|t| newest_first(t.bookings.iter().filter(|b| b.user_id == user_id).cloned())))
  }

  async fn bookings_for_provider(&self, provider_id: i32) -> Result<Vec<ServiceBooking>> {
    Ok(self.read(|t| newest_first(t.bookings.iter().filter(|b| b.provider_id == provider_id).cloned())))
  }

  async fn set_booking_status(&self, id: i32, from: BookingStatus, to: BookingStatus) -> Result<ServiceBooking> {
    self.write(|t| {
      let booking = t
        .bookings
        .iter_mut()
        .find(|b| b.id == id)
        .ok_or_else(|| AppError::not_found("Booking", id))?;
      if booking.status != from {
        return Err(stale_status("Booking", id, booking.status));
      }
      booking.status = to;
      booking.updated_at = Utc::now();
      Ok(booking.clone())
    })
  }
}

#[async_trait]
impl ApprovalStore for MemoryStorage {
  async fn approval_target(&self, subject: ApprovalSubject, id: i32) -> Result<Option<ApprovalTarget>> {
    Ok(self.read(|t| {
      let found = match subject {
        ApprovalSubject::Vendor => t
          .sellers
          .iter()
          .find(|s| s.id == id)
          .map(|s| (s.profile.business_name.clone(), s.user_id.clone(), s.approval.clone())),
        ApprovalSubject::Product => t.products.iter().find(|p| p.id == id).and_then(|p| {
          let seller = t.sellers.iter().find(|s| s.id == p.seller_id)?;
          Some((p.listing.name.clone(), seller.user_id.clone(), p.approval.clone()))
        }),
        ApprovalSubject::FoodVendor => t
          .food_vendors
          .iter()
          .find(|v| v.id == id)
          .map(|v| (v.restaurant_name.clone(), v.user_id.clone(), v.approval.clone())),
        ApprovalSubject::FoodItem => t.food_items.iter().find(|i| i.id == id).and_then(|i| {
          let vendor = t.food_vendors.iter().find(|v| v.id == i.vendor_id)?;
          Some((i.name.clone(), vendor.user_id.clone(), i.approval.clone()))
        }),
        ApprovalSubject::ServiceProvider => t
          .service_providers
          .iter()
          .find(|p| p.id == id)
          .map(|p| (p.business_name.clone(), p.user_id.clone(), p.approval.clone())),
        ApprovalSubject::DeliveryBoy => t
          .delivery_boys
          .iter()
          .find(|d| d.id == id)
          .map(|d| (d.name.clone(), d.user_id.clone(), d.approval.clone())),
      };
      found.map(|(display_name, owner_user_id, approval)| ApprovalTarget {
        subject,
        id,
        display_name,
        owner_user_id,
        approval,
      })
    }))
  }

  async fn record_approval(&self, subject: ApprovalSubject, id: i32, approval: &Approval) -> Result<()> {
    self.write(|t| {
      let now = Utc::now();
      let slot = match subject {
        ApprovalSubject::Vendor => t
          .sellers
          .iter_mut()
          .find(|s| s.id == id)
          .map(|s| (&mut s.approval, &mut s.updated_at)),
        ApprovalSubject::Product => t
          .products
          .iter_mut()
          .find(|p| p.id == id)
          .map(|p| (&mut p.approval, &mut p.updated_at)),
        ApprovalSubject::FoodVendor => t
          .food_vendors
          .iter_mut()
          .find(|v| v.id == id)
          .map(|v| (&mut v.approval, &mut v.updated_at)),
        ApprovalSubject::FoodItem => t
          .food_items
          .iter_mut()
          .find(|i| i.id == id)
          .map(|i| (&mut i.approval, &mut i.updated_at)),
        ApprovalSubject::ServiceProvider => t
          .service_providers
          .iter_mut()
          .find(|p| p.id == id)
          .map(|p| (&mut p.approval, &mut p.updated_at)),
        ApprovalSubject::DeliveryBoy => t
          .delivery_boys
          .iter_mut()
          .find(|d| d.id == id)
          .map(|d| (&mut d.approval, &mut d.updated_at)),
      };
      let (current, updated_at) = slot.ok_or_else(|| AppError::not_found(subject.label(), id))?;
      *current = approval.clone();
      *updated_at = now;
      Ok(())
    })
  }
}

#[async_trait]
impl Storage for MemoryStorage {
  fn backend_name(&self) -> &'static str {
    "memory"
  }

  async fn ping(&self) -> Result<()> {
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::Decision;
  use crate::storage::NewOrderLine;

  async fn storage_with_product(stock: i32) -> (MemoryStorage, Product) {
    let storage = MemoryStorage::new();
    storage
      .upsert_user(NewUser {
        id: "u1".into(),
        email: "u1@example.com".into(),
        first_name: None,
        last_name: None,
        password_hash: None,
        is_admin: false,
      })
      .await
      .unwrap();
    let seller = storage
      .create_seller(
        "u1",
        SellerProfile {
          business_name: "Acme".into(),
          ..Default::default()
        },
      )
      .await
      .unwrap();
    let category = storage
      .create_category(NewCategory {
        name: "Tools".into(),
        slug: "tools".into(),
        description: None,
        image_url: None,
      })
      .await
      .unwrap();
    let product = storage
      .create_product(
        seller.id,
        ProductListing {
          category_id: category.id,
          name: "Hammer".into(),
          description: None,
          price_cents: 25_000,
          original_price_cents: None,
          sku: Some("HAM-1".into()),
          stock,
          images: vec![],
        },
      )
      .await
      .unwrap();
    (storage, product)
  }

  fn order_for(product: &Product, quantity: i32, number: &str) -> NewOrder {
    NewOrder {
      user_id: "u1".into(),
      order_number: number.into(),
      status: OrderStatus::Pending,
      subtotal_cents: product.listing.price_cents * i64::from(quantity),
      tax_cents: 0,
      shipping_cents: 0,
      total_cents: product.listing.price_cents * i64::from(quantity),
      payment_method: PaymentMethod::Card,
      shipping_address: serde_json::json!({"city": "Pune"}),
      lines: vec![NewOrderLine {
        product_id: product.id,
        seller_id: product.seller_id,
        product_name: product.listing.name.clone(),
        quantity,
        unit_price_cents: product.listing.price_cents,
      }],
    }
  }

  #[tokio::test]
  async fn adding_the_same_product_twice_increments() {
    let (storage, product) = storage_with_product(10).await;
    let first = storage.add_to_cart("u1", product.id, 2).await.unwrap();
    let second = storage.add_to_cart("u1", product.id, 3).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.quantity, 5);
    assert_eq!(storage.cart_lines("u1").await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn cart_lines_are_capped_at_stock() {
    let (storage, product) = storage_with_product(4).await;
    storage.add_to_cart("u1", product.id, 3).await.unwrap();

    let err = storage.add_to_cart("u1", product.id, 2).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ref message) if message.contains("Only 4 available")));
    let held = storage.cart_item_for("u1", product.id).await.unwrap().unwrap();
    assert_eq!(held.quantity, 3);

    assert!(matches!(
      storage.add_to_cart("u1", 4_242, 1).await,
      Err(AppError::NotFound(_))
    ));
  }

  #[tokio::test]
  async fn placing_an_order_is_all_or_nothing() {
    let (storage, product) = storage_with_product(3).await;
    let err = storage.place_order(order_for(&product, 4, "ORD-1")).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(storage.list_orders(None).await.unwrap().is_empty());

    let placed = storage.place_order(order_for(&product, 3, "ORD-2")).await.unwrap();
    assert_eq!(placed.items.len(), 1);
    assert_eq!(placed.items[0].total_cents, 75_000);
    let reloaded = storage.product_by_id(product.id).await.unwrap().unwrap();
    assert_eq!(reloaded.listing.stock, 0);
  }

  #[tokio::test]
  async fn failed_payment_restores_stock_once() {
    let (storage, product) = storage_with_product(5).await;
    let placed = storage.place_order(order_for(&product, 2, "ORD-3")).await.unwrap();

    let order = storage
      .settle_payment(placed.order.id, PaymentOutcome::Failed)
      .await
      .unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.payment_status, PaymentStatus::Failed);
    let reloaded = storage.product_by_id(product.id).await.unwrap().unwrap();
    assert_eq!(reloaded.listing.stock, 5);

    assert!(matches!(
      storage.settle_payment(placed.order.id, PaymentOutcome::Failed).await,
      Err(AppError::Conflict(_))
    ));
  }

  #[tokio::test]
  async fn deactivating_a_product_empties_carts() {
    let (storage, product) = storage_with_product(5).await;
    storage.add_to_cart("u1", product.id, 1).await.unwrap();
    storage.deactivate_product(product.id).await.unwrap();
    assert!(storage.cart_lines("u1").await.unwrap().is_empty());
    assert!(!storage.product_by_id(product.id).await.unwrap().unwrap().is_active);
  }

  #[tokio::test]
  async fn duplicate_sku_is_a_conflict() {
    let (storage, product) = storage_with_product(5).await;
    let err = storage
      .create_product(product.seller_id, product.listing.clone())
      .await
      .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
  }

  /// A cash-on-delivery order for `product` with a fresh approved agent
  /// assigned to it.
  async fn assigned_delivery(storage: &MemoryStorage, product: &Product, number: &str) -> DeliveryAssignment {
    let mut order = order_for(product, 1, number);
    order.status = OrderStatus::Confirmed;
    order.payment_method = PaymentMethod::Cod;
    let placed = storage.place_order(order).await.unwrap();
    let agent = storage
      .create_delivery_boy(NewDeliveryBoy {
        user_id: format!("rider-{}", number),
        name: "Ravi".into(),
        phone: "9000000001".into(),
        vehicle_type: "bike".into(),
        vehicle_number: None,
      })
      .await
      .unwrap();
    let approved = Approval::pending().decide(&Decision::Approve, "admin", Utc::now()).unwrap();
    storage
      .record_approval(ApprovalSubject::DeliveryBoy, agent.id, &approved)
      .await
      .unwrap();
    storage
      .create_assignment(NewAssignment {
        order_id: placed.order.id,
        delivery_boy_id: agent.id,
        delivery_fee_cents: 0,
        notes: None,
        assigned_by: "admin".into(),
      })
      .await
      .unwrap()
  }

  #[tokio::test]
  async fn stale_delivery_status_is_a_conflict() {
    let (storage, product) = storage_with_product(5).await;
    let assignment = assigned_delivery(&storage, &product, "ORD-D1").await;

    let accepted = storage
      .advance_assignment(assignment.id, DeliveryStatus::Pending, DeliveryStatus::Accepted, Utc::now())
      .await
      .unwrap();
    assert!(accepted.accepted_at.is_some());

    // A second writer that also read `pending` loses.
    assert!(matches!(
      storage
        .advance_assignment(assignment.id, DeliveryStatus::Pending, DeliveryStatus::Accepted, Utc::now())
        .await,
      Err(AppError::Conflict(_))
    ));
    assert!(matches!(
      storage
        .advance_assignment(4_242, DeliveryStatus::Pending, DeliveryStatus::Accepted, Utc::now())
        .await,
      Err(AppError::NotFound(_))
    ));
  }

  #[tokio::test]
  async fn finishing_a_delivery_closes_order_and_frees_agent_once() {
    let (storage, product) = storage_with_product(5).await;
    let assignment = assigned_delivery(&storage, &product, "ORD-D2").await;

    // Not on the way yet.
    assert!(matches!(
      storage.finish_delivery(assignment.id, Utc::now()).await,
      Err(AppError::Conflict(_))
    ));

    for (from, to) in [
      (DeliveryStatus::Pending, DeliveryStatus::Accepted),
      (DeliveryStatus::Accepted, DeliveryStatus::PickedUp),
      (DeliveryStatus::PickedUp, DeliveryStatus::OnTheWay),
    ] {
      storage.advance_assignment(assignment.id, from, to, Utc::now()).await.unwrap();
    }
    let done = storage.finish_delivery(assignment.id, Utc::now()).await.unwrap();
    assert_eq!(done.status, DeliveryStatus::Delivered);
    assert!(done.delivered_at.is_some());

    let order = storage.order_by_id(assignment.order_id).await.unwrap().unwrap().order;
    assert_eq!(order.status, OrderStatus::Delivered);
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    let agent = storage.delivery_boy_by_id(assignment.delivery_boy_id).await.unwrap().unwrap();
    assert!(agent.is_available);
    assert_eq!(agent.total_deliveries, 1);

    assert!(matches!(
      storage.finish_delivery(assignment.id, Utc::now()).await,
      Err(AppError::Conflict(_))
    ));
    let agent = storage.delivery_boy_by_id(assignment.delivery_boy_id).await.unwrap().unwrap();
    assert_eq!(agent.total_deliveries, 1);
  }

  #[tokio::test]
  async fn a_busy_agent_cannot_take_a_second_order() {
    let (storage, product) = storage_with_product(5).await;
    let first = assigned_delivery(&storage, &product, "ORD-D3").await;
    let mut second = order_for(&product, 1, "ORD-D4");
    second.status = OrderStatus::Confirmed;
    let second = storage.place_order(second).await.unwrap();

    let err = storage
      .create_assignment(NewAssignment {
        order_id: second.order.id,
        delivery_boy_id: first.delivery_boy_id,
        delivery_fee_cents: 0,
        notes: None,
        assigned_by: "admin".into(),
      })
      .await
      .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert!(storage.active_assignment_for_order(second.order.id).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn food_and_booking_status_writes_are_compare_and_set() {
    let storage = MemoryStorage::new();
    let order = storage
      .create_food_order(NewFoodOrder {
        user_id: "u1".into(),
        vendor_id: 1,
        lines: vec![],
        subtotal_cents: 9_000,
        delivery_fee_cents: 3_000,
        total_cents: 12_000,
        delivery_address: "Hostel 7".into(),
      })
      .await
      .unwrap();
    storage
      .set_food_order_status(order.id, FoodOrderStatus::Pending, FoodOrderStatus::Accepted)
      .await
      .unwrap();
    assert!(matches!(
      storage
        .set_food_order_status(order.id, FoodOrderStatus::Pending, FoodOrderStatus::Cancelled)
        .await,
      Err(AppError::Conflict(_))
    ));
    let reloaded = storage.food_order_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, FoodOrderStatus::Accepted);

    let booking = storage
      .create_booking(NewBooking {
        user_id: "u1".into(),
        provider_id: 1,
        scheduled_at: Utc::now(),
        address: "12 Hill Road".into(),
        notes: None,
      })
      .await
      .unwrap();
    storage
      .set_booking_status(booking.id, BookingStatus::Pending, BookingStatus::Confirmed)
      .await
      .unwrap();
    assert!(matches!(
      storage
        .set_booking_status(booking.id, BookingStatus::Pending, BookingStatus::Cancelled)
        .await,
      Err(AppError::Conflict(_))
    ));
  }
}
