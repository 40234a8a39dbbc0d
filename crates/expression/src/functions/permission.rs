//! Permissions of principals on nodes

use structr_log::debug;

use super::{Builtin, FunctionOutput, entity, has_min_length};
use crate::context::ActionContext;
use crate::core::{EntityRef, Value};
use crate::error::ExpressionResult;
use crate::eval::Evaluator;
use crate::services::{Permission, SecurityService};

type Output = ExpressionResult<FunctionOutput>;

pub(super) const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "grant",
        apply: grant,
        usage: "Usage: ${grant(principal, node, permissions)}. Example: ${grant(me, this, 'read, write, delete'))}",
        usage_script: Some(
            "Usage: ${{Structr.grant(principal, node, permissions)}}. Example: ${{Structr.grant(Structr.get('me'), Structr.this, 'read, write, delete'))}}",
        ),
        description: "Grants the given permissions on the given entity to a user",
    },
    Builtin {
        name: "revoke",
        apply: revoke,
        usage: "Usage: ${revoke(principal, node, permissions)}. Example: ${revoke(me, this, 'write, delete'))}",
        usage_script: Some(
            "Usage: ${{Structr.revoke(principal, node, permissions)}}. Example: ${{Structr.revoke(Structr.('me'), Structr.this, 'write, delete'))}}",
        ),
        description: "Revokes the given permissions on the given entity from a user",
    },
    Builtin {
        name: "is_allowed",
        apply: is_allowed,
        usage: "Usage: ${is_allowed(principal, node, permissions)}. Example: ${is_allowed(me, this, 'write, delete'))}",
        usage_script: Some(
            "Usage: ${{Structr.is_allowed(principal, node, permissions)}}. Example: ${{Structr.is_allowed(Structr.('me'), Structr.this, 'write, delete'))}}",
        ),
        description: "Returns whether the principal has all of the permission(s) on the given node.",
    },
    Builtin {
        name: "set_privileged",
        apply: set_privileged,
        usage: "Usage: ${set_privileged(entity, propertyKey, value)}. Example: ${set_privileged(this, \"email\", lower(this.email))}",
        usage_script: Some(
            "Usage: ${{Structr.setPrvileged(entity, propertyKey, value)}}. Example: ${{Structr.setPrivileged(Structr.this, \"email\", lower(Structr.this.email))}}",
        ),
        description: "Sets the given key/value pair on the given entity with super-user privileges",
    },
];

/// Validated `(principal, node, permissions)` arguments
struct Grant<'a> {
    principal: &'a EntityRef,
    node: &'a EntityRef,
    permissions: Vec<Permission>,
}

/// `Ok(Err(message))` when the arguments have the wrong kind; unknown
/// permission names fail the call
fn parse_grant(args: &[Value]) -> ExpressionResult<Result<Grant<'_>, &'static str>> {
    let Some(principal) = args[0].as_entity().filter(|e| e.is_principal()) else {
        return Ok(Err("Error: first argument is not of type Principal."));
    };
    let Some(node) = args[1].as_entity().filter(|e| e.is_node()) else {
        return Ok(Err("Error: second argument is not a node."));
    };
    let Value::Text(list) = &args[2] else {
        return Ok(Err("Error: third argument is not a string."));
    };
    Ok(Ok(Grant {
        principal,
        node,
        permissions: Permission::parse_list(list)?,
    }))
}

fn apply_each(
    args: &[Value],
    eval: &Evaluator,
    op: fn(&dyn SecurityService, &EntityRef, &EntityRef, Permission) -> ExpressionResult<()>,
) -> Output {
    if !has_min_length(args, 3) {
        return Ok(FunctionOutput::Usage);
    }
    let grant = match parse_grant(args)? {
        Ok(grant) => grant,
        Err(message) => return Ok(Value::text(message).into()),
    };
    let security = eval.services().require_security()?;
    for permission in grant.permissions {
        op(security, grant.principal, grant.node, permission)?;
    }
    Ok(FunctionOutput::empty())
}

fn grant(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    apply_each(args, eval, |security, principal, node, permission| {
        debug!(principal = %principal.id, node = %node.id, %permission, "Granting permission");
        security.grant(principal, node, permission)
    })
}

fn revoke(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    apply_each(args, eval, |security, principal, node, permission| {
        debug!(principal = %principal.id, node = %node.id, %permission, "Revoking permission");
        security.revoke(principal, node, permission)
    })
}

fn is_allowed(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 3) {
        return Ok(FunctionOutput::Usage);
    }
    let grant = match parse_grant(args)? {
        Ok(grant) => grant,
        Err(message) => return Ok(Value::text(message).into()),
    };
    let security = eval.services().require_security()?;
    let allowed = grant
        .permissions
        .iter()
        .all(|permission| security.is_granted(grant.principal, grant.node, *permission));
    Ok(Value::Bool(allowed).into())
}

/// `set` under a super-user context, serialized per entity
fn set_privileged(
    args: &[Value],
    eval: &Evaluator,
    ctx: &mut ActionContext,
    subject: Option<&EntityRef>,
) -> Output {
    let target = args.first().and_then(Value::as_entity).or(subject);
    let lock = target.map(|entity| eval.entity_lock(entity));
    let result = {
        let _held = lock.as_ref().map(|lock| lock.lock());
        let mut elevated = ctx.elevate();
        entity::set(args, eval, &mut elevated, subject)
    };

    drop(lock);
    if let Some(entity) = target {
        eval.release_entity_lock(entity);
    }
    result?;
    Ok(FunctionOutput::empty())
}
