// src/pipelines/approval_pipeline.rs

//! Admin decisions on vendors and their listings. One flow serves every
//! approvable record; the subject picks the table.

use crate::errors::AppError;
use crate::models::Decision;
use crate::pipelines::common_steps::{missing, notify};
use crate::pipelines::contexts::ApprovalCtxData;
use chrono::Utc;
use shopnish_flow::{Flow, FlowContext, FlowRegistry, StepControl, StepDef};
use tracing::info;

pub fn register_approval_pipeline(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<ApprovalCtxData, AppError>::new(
    "approval",
    [
      StepDef::required("validate_decision"),
      StepDef::required("load_subject"),
      StepDef::required("apply_transition"),
      StepDef::required("persist_decision"),
      StepDef::optional("notify_owner"),
    ],
  );

  flow.on("validate_decision", |ctx: FlowContext<ApprovalCtxData>| async move {
    let needs_reason = ctx.snapshot(|data| match &data.decision {
      Decision::Reject { reason } => reason.trim().is_empty(),
      Decision::Approve => false,
    });
    if needs_reason {
      return Err(AppError::Validation("A rejection reason is required.".to_string()));
    }
    Ok(StepControl::Continue)
  });

  flow.on("load_subject", |ctx: FlowContext<ApprovalCtxData>| async move {
    let (subject, id, storage) = ctx.snapshot(|data| (data.subject, data.target_id, data.app.storage.clone()));
    let target = storage
      .approval_target(subject, id)
      .await?
      .ok_or_else(|| AppError::not_found(subject.label(), id))?;
    ctx.update(|data| data.target = Some(target));
    Ok::<_, AppError>(StepControl::Continue)
  });

  flow.on("apply_transition", |ctx: FlowContext<ApprovalCtxData>| async move {
    ctx.update(|data| {
      let target = data.target.as_ref().ok_or_else(|| missing("approval target"))?;
      let next = target
        .approval
        .decide(&data.decision, &data.admin_id, Utc::now())
        .map_err(|err| match err {
          AppError::Conflict(_) => AppError::Conflict(format!(
            "{} {} is already {}",
            target.subject.label(),
            target.id,
            data.decision.target_status()
          )),
          other => other,
        })?;
      data.approval = Some(next);
      Ok::<_, AppError>(())
    })?;
    Ok::<_, AppError>(StepControl::Continue)
  });

  flow.on("persist_decision", |ctx: FlowContext<ApprovalCtxData>| async move {
    let (subject, id, approval, storage) =
      ctx.snapshot(|data| (data.subject, data.target_id, data.approval.clone(), data.app.storage.clone()));
    let approval = approval.ok_or_else(|| missing("approval"))?;
    storage.record_approval(subject, id, &approval).await?;
    info!(
      subject = subject.slug(),
      id,
      status = %approval.approval_status,
      approved_by = ?approval.approved_by,
      "Approval decision recorded."
    );
    ctx.update(|data| {
      if let Some(target) = data.target.as_mut() {
        target.approval = approval;
      }
    });
    Ok::<_, AppError>(StepControl::Continue)
  });

  flow.on("notify_owner", |ctx: FlowContext<ApprovalCtxData>| async move {
    let (target, app) = ctx.snapshot(|data| (data.target.clone(), data.app.clone()));
    let target = target.ok_or_else(|| missing("approval target"))?;
    let Some(owner) = app.storage.find_user(&target.owner_user_id).await? else {
      return Ok(StepControl::Continue);
    };
    let body = match &target.approval.rejection_reason {
      Some(reason) => format!(
        "Your {} \"{}\" was rejected: {}",
        target.subject.label().to_lowercase(),
        target.display_name,
        reason
      ),
      None => format!(
        "Your {} \"{}\" was approved.",
        target.subject.label().to_lowercase(),
        target.display_name
      ),
    };
    let sent = notify(&app.config, &owner.email, "Shopnish approval update", &body).await;
    ctx.update(|data| data.owner_notified = sent);
    Ok::<_, AppError>(StepControl::Continue)
  });

  registry.register(flow);
  info!("Approval flow registered.");
}
