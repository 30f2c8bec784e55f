//! Redirect decision - ordered rules, first match wins
//!
//! Pure: everything the rules look at is passed in, the result is a tagged
//! [`Action`] and the coordinator performs it. The rule order is
//! authoritative; overlapping preference combinations resolve to whichever
//! rule comes first (see [`Preferences::conflicts`]).

use serde::Serialize;

use crate::preferences::{NewTabPolicy, Preferences};
use crate::types::{ChangeInfo, ContainerId, Tab};
use crate::urls;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IgnoreReason {
    CreatingInSameContainer,
    NoContainerTab,
    AutomaticModeInactive,
}

/// What to do with a tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    /// Incognito tab: disable the browser action, nothing else
    DisableAffordance,
    Ignore { reason: IgnoreReason },
    /// Extension page, hand to the confirmation page handler
    HandleConfirmPage,
    /// New tab waiting for its first navigation
    AddPendingBadge,
    /// Home page inside a temporary container: reopen in the default container
    OpenInDefaultContainer,
    #[serde(rename_all = "camelCase")]
    ReloadInTempContainer { deletes_history: bool },
    #[serde(rename_all = "camelCase")]
    MarkDirty { container_id: ContainerId },
    NoAction,
}

/// Registry and guard state the rules depend on, read once per decision
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    pub preferences: &'a Preferences,
    pub creating_in_same_container: bool,
    pub excluded: bool,
    pub container_temporary: bool,
    pub container_clean: bool,
}

pub fn evaluate(tab: &Tab, change_info: &ChangeInfo, ctx: &DecisionContext<'_>) -> Action {
    let prefs = ctx.preferences;

    if tab.incognito {
        return Action::DisableAffordance;
    }

    if ctx.creating_in_same_container {
        return Action::Ignore {
            reason: IgnoreReason::CreatingInSameContainer,
        };
    }

    if ctx.excluded {
        return Action::Ignore {
            reason: IgnoreReason::NoContainerTab,
        };
    }

    if tab.url().is_some_and(urls::is_extension_page) {
        return Action::HandleConfirmPage;
    }

    if !prefs.automatic_mode.active {
        return Action::Ignore {
            reason: IgnoreReason::AutomaticModeInactive,
        };
    }

    let deletes_history = prefs.deletes_history_automatically();
    let policy = prefs.automatic_mode.new_tab;
    let in_default_container = tab.cookie_store_id == prefs.default_container();
    let new_tab_page =
        tab.url().is_some_and(urls::is_home_or_new_tab) || urls::is_blank_navigation(change_info);

    if !deletes_history
        && policy == NewTabPolicy::Navigation
        && in_default_container
        && new_tab_page
    {
        return Action::AddPendingBadge;
    }

    if tab.url_is(urls::ABOUT_HOME) && ctx.container_temporary && policy == NewTabPolicy::Navigation
    {
        return Action::OpenInDefaultContainer;
    }

    if (policy == NewTabPolicy::Created || deletes_history) && in_default_container && new_tab_page {
        return Action::ReloadInTempContainer { deletes_history };
    }

    if tab.url().is_some_and(urls::is_real_page) && ctx.container_temporary && ctx.container_clean
    {
        return Action::MarkDirty {
            container_id: tab.cookie_store_id.clone(),
        };
    }

    Action::NoAction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::DeletesHistoryPolicy;
    use crate::types::TabStatus;

    fn tab(url: &str, container: &str) -> Tab {
        Tab {
            id: 1,
            window_id: 1,
            index: 0,
            url: Some(url.to_string()),
            cookie_store_id: container.to_string(),
            incognito: false,
            active: true,
        }
    }

    fn prefs(policy: NewTabPolicy, history: DeletesHistoryPolicy) -> Preferences {
        let mut prefs = Preferences::default();
        prefs.automatic_mode.active = true;
        prefs.automatic_mode.new_tab = policy;
        prefs.deletes_history.automatic_mode = history;
        prefs
    }

    fn ctx(prefs: &Preferences) -> DecisionContext<'_> {
        DecisionContext {
            preferences: prefs,
            creating_in_same_container: false,
            excluded: false,
            container_temporary: false,
            container_clean: false,
        }
    }

    #[test]
    fn test_incognito_always_disables() {
        let policies = [NewTabPolicy::Created, NewTabPolicy::Navigation];
        let histories = [DeletesHistoryPolicy::Automatic, DeletesHistoryPolicy::Manual];
        let urls = ["about:home", "about:newtab", "https://example.com", "moz-extension://x/y"];

        for policy in policies {
            for history in histories {
                let prefs = prefs(policy, history);
                for url in urls {
                    let mut t = tab(url, "firefox-default");
                    t.incognito = true;
                    let context = DecisionContext {
                        container_temporary: true,
                        container_clean: true,
                        ..ctx(&prefs)
                    };
                    assert_eq!(
                        evaluate(&t, &ChangeInfo::default(), &context),
                        Action::DisableAffordance
                    );
                }
            }
        }
    }

    #[test]
    fn test_guard_and_exclusion_short_circuit() {
        let prefs = prefs(NewTabPolicy::Created, DeletesHistoryPolicy::Manual);
        let t = tab("about:newtab", "firefox-default");

        let guarded = DecisionContext {
            creating_in_same_container: true,
            excluded: true,
            ..ctx(&prefs)
        };
        assert_eq!(
            evaluate(&t, &ChangeInfo::default(), &guarded),
            Action::Ignore {
                reason: IgnoreReason::CreatingInSameContainer
            }
        );

        let excluded = DecisionContext {
            excluded: true,
            ..ctx(&prefs)
        };
        assert_eq!(
            evaluate(&t, &ChangeInfo::default(), &excluded),
            Action::Ignore {
                reason: IgnoreReason::NoContainerTab
            }
        );
    }

    #[test]
    fn test_extension_page_handled_even_without_automatic_mode() {
        let prefs = Preferences::default();
        let t = tab("moz-extension://abc/confirm-page.html", "firefox-default");
        assert_eq!(
            evaluate(&t, &ChangeInfo::default(), &ctx(&prefs)),
            Action::HandleConfirmPage
        );
    }

    #[test]
    fn test_automatic_mode_inactive() {
        let prefs = Preferences::default();
        let t = tab("about:newtab", "firefox-default");
        assert_eq!(
            evaluate(&t, &ChangeInfo::default(), &ctx(&prefs)),
            Action::Ignore {
                reason: IgnoreReason::AutomaticModeInactive
            }
        );
    }

    #[test]
    fn test_navigation_policy_badges_blank_navigation() {
        let prefs = prefs(NewTabPolicy::Navigation, DeletesHistoryPolicy::Manual);
        let mut t = tab("about:blank", "firefox-default");
        t.url = None;
        let change = ChangeInfo::url("about:blank").with_status(TabStatus::Loading);

        assert_eq!(evaluate(&t, &change, &ctx(&prefs)), Action::AddPendingBadge);
    }

    #[test]
    fn test_navigation_policy_home_in_temp_container() {
        let prefs = prefs(NewTabPolicy::Navigation, DeletesHistoryPolicy::Manual);
        let t = tab("about:home", "firefox-container-4");
        let context = DecisionContext {
            container_temporary: true,
            container_clean: true,
            ..ctx(&prefs)
        };

        assert_eq!(
            evaluate(&t, &ChangeInfo::default(), &context),
            Action::OpenInDefaultContainer
        );
    }

    #[test]
    fn test_created_policy_reloads_new_tab() {
        let prefs = prefs(NewTabPolicy::Created, DeletesHistoryPolicy::Manual);
        let t = tab("about:newtab", "firefox-default");

        assert_eq!(
            evaluate(&t, &ChangeInfo::default(), &ctx(&prefs)),
            Action::ReloadInTempContainer {
                deletes_history: false
            }
        );
    }

    #[test]
    fn test_automatic_history_deletion_wins_over_navigation_badge() {
        let prefs = prefs(NewTabPolicy::Navigation, DeletesHistoryPolicy::Automatic);
        let t = tab("about:newtab", "firefox-default");

        assert_eq!(
            evaluate(&t, &ChangeInfo::default(), &ctx(&prefs)),
            Action::ReloadInTempContainer {
                deletes_history: true
            }
        );
    }

    #[test]
    fn test_custom_prefix_default_container() {
        let mut prefs = prefs(NewTabPolicy::Created, DeletesHistoryPolicy::Manual);
        prefs.container_prefix = "waterfox".to_string();

        let foreign = tab("about:newtab", "firefox-default");
        assert_eq!(
            evaluate(&foreign, &ChangeInfo::default(), &ctx(&prefs)),
            Action::NoAction
        );

        let native = tab("about:newtab", "waterfox-default");
        assert_eq!(
            evaluate(&native, &ChangeInfo::default(), &ctx(&prefs)),
            Action::ReloadInTempContainer {
                deletes_history: false
            }
        );
    }

    #[test]
    fn test_real_navigation_marks_clean_container_dirty() {
        let prefs = prefs(NewTabPolicy::Created, DeletesHistoryPolicy::Manual);
        let t = tab("https://example.com", "firefox-container-2");

        let clean = DecisionContext {
            container_temporary: true,
            container_clean: true,
            ..ctx(&prefs)
        };
        assert_eq!(
            evaluate(&t, &ChangeInfo::url("https://example.com"), &clean),
            Action::MarkDirty {
                container_id: "firefox-container-2".to_string()
            }
        );

        let used = DecisionContext {
            container_temporary: true,
            container_clean: false,
            ..ctx(&prefs)
        };
        assert_eq!(
            evaluate(&t, &ChangeInfo::url("https://example.com"), &used),
            Action::NoAction
        );
    }

    #[test]
    fn test_about_pages_in_temp_container_are_no_op() {
        let prefs = prefs(NewTabPolicy::Created, DeletesHistoryPolicy::Manual);
        let t = tab("about:config", "firefox-container-2");
        let context = DecisionContext {
            container_temporary: true,
            container_clean: true,
            ..ctx(&prefs)
        };
        assert_eq!(
            evaluate(&t, &ChangeInfo::default(), &context),
            Action::NoAction
        );
    }

    #[test]
    fn test_action_json_fields_are_camel_case() {
        let json = serde_json::to_value(Action::ReloadInTempContainer {
            deletes_history: true,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "action": "reloadInTempContainer", "deletesHistory": true })
        );

        let json = serde_json::to_value(Action::Ignore {
            reason: IgnoreReason::NoContainerTab,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "action": "ignore", "reason": "noContainerTab" })
        );
    }
}
