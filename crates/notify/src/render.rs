//! Plain-text message rendering for each alert shape.
//!
//! Messages are short and fixed-form; the interesting state (deadline,
//! link, reporter comments) is interpolated, everything else is copy.

use crate::RenderedMessage;

/// Status-check request with the one-click response link.
#[must_use]
pub fn status_check(
    to_email: &str,
    to_name: &str,
    task_name: &str,
    task_external_id: &str,
    deadline: &str,
    magic_link: &str,
) -> RenderedMessage {
    RenderedMessage {
        to_email: to_email.to_owned(),
        to_name: to_name.to_owned(),
        subject: format!("Status check: {task_external_id} due {deadline}"),
        body: format!(
            "Hi {to_name},\n\n\
             \"{task_name}\" ({task_external_id}) is due on {deadline}.\n\
             Please confirm where it stands - one click, no login:\n\n\
             {magic_link}\n\n\
             On track, delayed, blocked, or already done: the link covers all four.\n"
        ),
    }
}

/// Reminder for an unanswered status check.
#[must_use]
pub fn reminder(
    to_email: &str,
    to_name: &str,
    task_external_id: &str,
    deadline: &str,
    magic_link: &str,
) -> RenderedMessage {
    RenderedMessage {
        to_email: to_email.to_owned(),
        to_name: to_name.to_owned(),
        subject: format!("Reminder: status check for {task_external_id}"),
        body: format!(
            "Hi {to_name},\n\n\
             Still waiting on a status for {task_external_id} (due {deadline}).\n\
             It takes one click:\n\n{magic_link}\n"
        ),
    }
}

/// Escalation notice to the next person in the chain.
#[must_use]
pub fn escalation(
    to_email: &str,
    to_name: &str,
    task_name: &str,
    task_external_id: &str,
    deadline: &str,
    previous_recipient: &str,
    magic_link: &str,
) -> RenderedMessage {
    RenderedMessage {
        to_email: to_email.to_owned(),
        to_name: to_name.to_owned(),
        subject: format!("Escalated: {task_external_id} needs a status"),
        body: format!(
            "Hi {to_name},\n\n\
             A status request for \"{task_name}\" ({task_external_id}, due {deadline}) \
             sent to {previous_recipient} went unanswered and has been escalated to you.\n\n\
             {magic_link}\n"
        ),
    }
}

/// CRITICAL blocker report to the PM.
#[must_use]
pub fn blocker_report(
    to_email: &str,
    to_name: &str,
    task_name: &str,
    task_external_id: &str,
    description: &str,
) -> RenderedMessage {
    RenderedMessage {
        to_email: to_email.to_owned(),
        to_name: to_name.to_owned(),
        subject: format!("BLOCKED: {task_external_id}"),
        body: format!(
            "{to_name},\n\n\
             \"{task_name}\" ({task_external_id}) has been reported blocked:\n\n\
             {description}\n\n\
             The work item is flagged for your review.\n"
        ),
    }
}

/// Delay approval request to the PM.
#[must_use]
pub fn approval_request(
    to_email: &str,
    to_name: &str,
    task_external_id: &str,
    delay_days: i64,
    proposed_new_date: &str,
    risk_level: &str,
) -> RenderedMessage {
    RenderedMessage {
        to_email: to_email.to_owned(),
        to_name: to_name.to_owned(),
        subject: format!("Approval needed: {delay_days}-day delay on {task_external_id}"),
        body: format!(
            "{to_name},\n\n\
             A {delay_days}-day delay has been reported on {task_external_id} \
             (proposed new end: {proposed_new_date}, assessed risk: {risk_level}).\n\
             It is waiting for your approval in the queue.\n"
        ),
    }
}

/// Nobody in the escalation chain was available.
#[must_use]
pub fn no_recipient(
    to_email: &str,
    to_name: &str,
    task_name: &str,
    task_external_id: &str,
    deadline: &str,
    original_assignee: &str,
    skipped: &[String],
) -> RenderedMessage {
    let skipped_list = if skipped.is_empty() {
        "(none listed)".to_owned()
    } else {
        skipped.join(", ")
    };
    RenderedMessage {
        to_email: to_email.to_owned(),
        to_name: to_name.to_owned(),
        subject: format!("No recipient available for {task_external_id}"),
        body: format!(
            "{to_name},\n\n\
             \"{task_name}\" ({task_external_id}) is due {deadline} but nobody in the \
             escalation chain for {original_assignee} is available.\n\
             Skipped: {skipped_list}.\n\n\
             Manual intervention required.\n"
        ),
    }
}

/// CRITICAL ops notice when a scheduler job keeps failing and is paused.
#[must_use]
pub fn job_paused(to_email: &str, to_name: &str, job_name: &str, failures: u32) -> RenderedMessage {
    RenderedMessage {
        to_email: to_email.to_owned(),
        to_name: to_name.to_owned(),
        subject: format!("Scheduler job paused: {job_name}"),
        body: format!(
            "{to_name},\n\n\
             The scheduler job '{job_name}' failed {failures} consecutive times and \
             has been paused. It will not run again until the service restarts or \
             the job is resumed manually.\n"
        ),
    }
}
