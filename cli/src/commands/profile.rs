use anyhow::{Result, bail};

use bua_core::models::{GoalType, NewProfile, NewUser, UpdateProfile};

use super::helpers::{Service, active_user, finish, print_json};

fn check_goal(kcal: i64) -> Result<()> {
    if !(500..=10_000).contains(&kcal) {
        bail!("Daily goal must be between 500 and 10000 kcal");
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn cmd_init(
    service: &Service,
    name: &str,
    avatar: &str,
    kcal: i64,
    goal: GoalType,
    goal_text: Option<String>,
    json: bool,
) -> Result<()> {
    check_goal(kcal)?;
    if name.trim().is_empty() {
        bail!("Name cannot be empty");
    }

    let (user, profile) = service
        .complete_onboarding(
            &NewUser {
                display_name: name.trim().to_string(),
                avatar: avatar.to_string(),
            },
            &NewProfile {
                daily_kcal_goal: kcal,
                goal_type: goal,
                goal_text,
                goal_icon: None,
            },
        )
        .await?;

    if json {
        print_json(&serde_json::json!({ "user": user, "profile": profile }))?;
    } else {
        println!(
            "Welcome, {} {}! Daily goal: {} kcal ({}).",
            user.avatar, user.display_name, profile.daily_kcal_goal, profile.goal_type
        );
    }
    Ok(())
}

pub(crate) fn cmd_profile_show(service: &Service, json: bool) -> Result<()> {
    let user = active_user(service)?;
    let profile = service.profile(&user.id)?;

    if json {
        return print_json(&serde_json::json!({ "user": user, "profile": profile }));
    }

    println!("{} {}", user.avatar, user.display_name);
    match profile {
        Some(p) => {
            println!("  Daily goal: {} kcal", p.daily_kcal_goal);
            println!("  Goal:       {}", p.goal_type);
            if let Some(text) = p.goal_text {
                println!("  Note:       {text}");
            }
        }
        None => println!("  No profile set."),
    }
    let limits = service.limits();
    println!(
        "  Limits:     {} logs/day, {} favorites, {} items/template",
        limits.daily_log_cap, limits.max_favorites, limits.max_template_items
    );
    Ok(())
}

pub(crate) async fn cmd_profile_set(
    service: &Service,
    kcal: Option<i64>,
    goal: Option<GoalType>,
    goal_text: Option<String>,
    json: bool,
) -> Result<()> {
    if let Some(kcal) = kcal {
        check_goal(kcal)?;
    }
    let user = active_user(service)?;
    let update = UpdateProfile {
        daily_kcal_goal: kcal,
        goal_type: goal,
        goal_text: goal_text.map(|t| if t.is_empty() { None } else { Some(t) }),
        goal_icon: None,
    };

    let outcome = service.update_profile(&user.id, &update).await?;
    finish(outcome, json, |p| {
        println!("Updated: {} kcal/day, goal {}", p.daily_kcal_goal, p.goal_type);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_bounds() {
        assert!(check_goal(2000).is_ok());
        assert!(check_goal(100).is_err());
        assert!(check_goal(20_000).is_err());
    }
}
