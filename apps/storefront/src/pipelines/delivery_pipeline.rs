// src/pipelines/delivery_pipeline.rs

//! Delivery hand-off: an admin assigns a confirmed order to an agent, then the
//! agent walks the assignment through its states one at a time.

use crate::errors::AppError;
use crate::models::{DeliveryStatus, OrderStatus};
use crate::pipelines::common_steps::{missing, notify};
use crate::pipelines::contexts::{AssignDeliveryCtxData, DeliveryStatusCtxData};
use crate::storage::NewAssignment;
use chrono::Utc;
use shopnish_flow::{Flow, FlowContext, FlowRegistry, StepControl, StepDef};
use tracing::{info, warn};

pub fn register_assign_delivery_pipeline(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<AssignDeliveryCtxData, AppError>::new(
    "assign_delivery",
    [
      StepDef::required("validate_assignment_input"),
      StepDef::required("load_order"),
      StepDef::required("load_delivery_agent"),
      StepDef::required("create_assignment"),
      StepDef::optional("notify_agent"),
    ],
  );

  flow.on("validate_assignment_input", |ctx: FlowContext<AssignDeliveryCtxData>| async move {
    if ctx.read().delivery_fee_cents < 0 {
      return Err(AppError::Validation("deliveryFeeCents must not be negative.".to_string()));
    }
    Ok(StepControl::Continue)
  });

  flow.on("load_order", |ctx: FlowContext<AssignDeliveryCtxData>| async move {
    let (order_id, storage) = ctx.snapshot(|data| (data.order_id, data.app.storage.clone()));
    let order = storage
      .order_by_id(order_id)
      .await?
      .ok_or_else(|| AppError::not_found("Order", order_id))?
      .order;
    if order.status != OrderStatus::Confirmed {
      return Err(AppError::Conflict(format!(
        "Only confirmed orders can be assigned; order {} is {}",
        order.id, order.status
      )));
    }
    if storage.active_assignment_for_order(order_id).await?.is_some() {
      return Err(AppError::Conflict(format!(
        "Order {} already has an active delivery assignment",
        order_id
      )));
    }
    ctx.update(|data| data.order = Some(order));
    Ok(StepControl::Continue)
  });

  flow.on("load_delivery_agent", |ctx: FlowContext<AssignDeliveryCtxData>| async move {
    let (agent_id, storage) = ctx.snapshot(|data| (data.delivery_boy_id, data.app.storage.clone()));
    let agent = storage
      .delivery_boy_by_id(agent_id)
      .await?
      .ok_or_else(|| AppError::not_found("Delivery agent", agent_id))?;
    if !agent.approval.is_approved() {
      return Err(AppError::Conflict(format!("Delivery agent {} is not approved", agent_id)));
    }
    if !agent.is_available {
      return Err(AppError::Conflict(format!("Delivery agent {} is not available", agent_id)));
    }
    ctx.update(|data| data.agent = Some(agent));
    Ok(StepControl::Continue)
  });

  flow.on("create_assignment", |ctx: FlowContext<AssignDeliveryCtxData>| async move {
    let (assignment, storage) = ctx.snapshot(|data| {
      (
        NewAssignment {
          order_id: data.order_id,
          delivery_boy_id: data.delivery_boy_id,
          delivery_fee_cents: data.delivery_fee_cents,
          notes: data.notes.clone(),
          assigned_by: data.admin_id.clone(),
        },
        data.app.storage.clone(),
      )
    });
    let assignment = storage.create_assignment(assignment).await?;
    info!(
      assignment_id = assignment.id,
      order_id = assignment.order_id,
      delivery_boy_id = assignment.delivery_boy_id,
      "Delivery assigned."
    );
    ctx.update(|data| data.assignment = Some(assignment));
    Ok::<_, AppError>(StepControl::Continue)
  });

  flow.on("notify_agent", |ctx: FlowContext<AssignDeliveryCtxData>| async move {
    let (agent, order, app) = ctx.snapshot(|data| (data.agent.clone(), data.order.clone(), data.app.clone()));
    let (agent, order) = match (agent, order) {
      (Some(agent), Some(order)) => (agent, order),
      _ => return Err(missing("agent or order")),
    };
    if let Some(user) = app.storage.find_user(&agent.user_id).await? {
      notify(
        &app.config,
        &user.email,
        "New delivery assigned",
        &format!("Hi {}, order {} is ready for pickup.", agent.name, order.order_number),
      )
      .await;
    }
    Ok(StepControl::Continue)
  });

  registry.register(flow);
  info!("Assign-delivery flow registered.");
}

pub fn register_delivery_status_pipeline(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<DeliveryStatusCtxData, AppError>::new(
    "delivery_status",
    [
      StepDef::required("load_assignment"),
      StepDef::required("authorize_agent"),
      StepDef::required("check_transition"),
      StepDef::required("advance_assignment"),
      StepDef::required("apply_order_side_effects"),
    ],
  );

  flow.on("load_assignment", |ctx: FlowContext<DeliveryStatusCtxData>| async move {
    let (id, storage) = ctx.snapshot(|data| (data.assignment_id, data.app.storage.clone()));
    let assignment = storage
      .assignment_by_id(id)
      .await?
      .ok_or_else(|| AppError::not_found("Delivery assignment", id))?;
    ctx.update(|data| data.assignment = Some(assignment));
    Ok::<_, AppError>(StepControl::Continue)
  });

  flow.on("authorize_agent", |ctx: FlowContext<DeliveryStatusCtxData>| async move {
    let (user_id, assignment, storage) =
      ctx.snapshot(|data| (data.user_id.clone(), data.assignment.clone(), data.app.storage.clone()));
    let assignment = assignment.ok_or_else(|| missing("assignment"))?;
    let agent = storage.delivery_boy_by_user(&user_id).await?;
    if agent.map(|a| a.id) != Some(assignment.delivery_boy_id) {
      warn!(%user_id, assignment_id = assignment.id, "Status update from someone other than the assigned agent.");
      return Err(AppError::Forbidden(
        "Only the assigned delivery agent can update this delivery.".to_string(),
      ));
    }
    Ok(StepControl::Continue)
  });

  flow.on("check_transition", |ctx: FlowContext<DeliveryStatusCtxData>| async move {
    let (assignment, requested) = ctx.snapshot(|data| (data.assignment.clone(), data.requested));
    let assignment = assignment.ok_or_else(|| missing("assignment"))?;
    if assignment.status.next() != Some(requested) {
      return Err(AppError::Conflict(format!(
        "Cannot move a delivery from {} to {}",
        assignment.status, requested
      )));
    }
    Ok(StepControl::Continue)
  });

  // The write is guarded by the status read in `load_assignment`, so a
  // concurrent update of the same assignment loses with a conflict.
  flow.on("advance_assignment", |ctx: FlowContext<DeliveryStatusCtxData>| async move {
    let (id, current, requested, storage) = ctx.snapshot(|data| {
      (
        data.assignment_id,
        data.assignment.as_ref().map(|a| a.status),
        data.requested,
        data.app.storage.clone(),
      )
    });
    let current = current.ok_or_else(|| missing("assignment"))?;
    let updated = match requested {
      DeliveryStatus::Delivered => storage.finish_delivery(id, Utc::now()).await?,
      _ => storage.advance_assignment(id, current, requested, Utc::now()).await?,
    };
    info!(assignment_id = id, status = %updated.status, "Delivery status advanced.");
    ctx.update(|data| data.assignment = Some(updated));
    Ok::<_, AppError>(StepControl::Continue)
  });

  flow.on("apply_order_side_effects", |ctx: FlowContext<DeliveryStatusCtxData>| async move {
    let (assignment, storage) = ctx.snapshot(|data| (data.assignment.clone(), data.app.storage.clone()));
    let assignment = assignment.ok_or_else(|| missing("assignment"))?;
    match assignment.status {
      DeliveryStatus::PickedUp => {
        storage
          .update_order_status(assignment.order_id, OrderStatus::Shipped, None)
          .await?;
      }
      DeliveryStatus::Delivered => {
        // `finish_delivery` already closed the order and freed the agent.
        info!(order_id = assignment.order_id, delivery_boy_id = assignment.delivery_boy_id, "Order delivered.");
      }
      DeliveryStatus::Pending | DeliveryStatus::Accepted | DeliveryStatus::OnTheWay => {}
    }
    Ok::<_, AppError>(StepControl::Continue)
  });

  registry.register(flow);
  info!("Delivery status flow registered.");
}
