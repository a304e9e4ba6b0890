//! Narrows what a signed-in user may see and select, based on the coarse permission label
//! stored on their profile.

use crate::config::{AnalyticsConfig, ScopeRuleConfig};
use crate::error::{AnalyticsError, Result};
use crate::normalize::{compact_key, Branch, ClassType};
use crate::period::{PeriodSpec, RecordFilter};
use crate::schema::{EnrollmentRecord, Role, UserProfile};
use log::debug;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub struct ScopeRule {
    pub name: String,
    keywords: Vec<String>,
    pub branches: Vec<Branch>,
    pub grades: Vec<ClassType>,
}

impl ScopeRule {
    pub fn from_config(config: &ScopeRuleConfig) -> Self {
        Self {
            name: config.name.clone(),
            keywords: config
                .keywords
                .iter()
                .map(|k| compact_key(k))
                .filter(|k| !k.is_empty())
                .collect(),
            branches: config.branches.iter().map(|b| Branch::canonicalize(b)).collect(),
            grades: config.grades.iter().map(|g| ClassType::normalize(g)).collect(),
        }
    }

    fn matches(&self, label_key: &str) -> bool {
        self.keywords.iter().any(|k| label_key.contains(k.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    /// Admin-equivalent: no narrowing.
    All,
    Limited {
        label: String,
        branches: Vec<Branch>,
        grades: Vec<ClassType>,
    },
    Nothing,
}

impl Scope {
    pub fn allows_branch(&self, branch: &Branch) -> bool {
        match self {
            Scope::All => true,
            Scope::Limited { branches, .. } => branches.contains(branch),
            Scope::Nothing => false,
        }
    }
}

/// Role table plus permission-group lookup. Built once from [`AnalyticsConfig`] and passed
/// to whatever needs to scope data.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    rules: Vec<ScopeRule>,
    admin_emails: HashSet<String>,
}

impl AccessPolicy {
    pub fn new(rules: Vec<ScopeRule>, admin_emails: impl IntoIterator<Item = String>) -> Self {
        Self {
            rules,
            admin_emails: admin_emails
                .into_iter()
                .map(|e| e.trim().to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self::new(
            config.scope_rules.iter().map(ScopeRule::from_config).collect(),
            config.admin_emails.iter().cloned(),
        )
    }

    pub fn rules(&self) -> &[ScopeRule] {
        &self.rules
    }

    pub fn is_admin(&self, user: &UserProfile) -> bool {
        user.role == Role::Admin || self.admin_emails.contains(&user.email.trim().to_lowercase())
    }

    /// Keyword lookup tolerant of casing, diacritics, spacing and trailing variants.
    pub fn rule_for_label(&self, label: &str) -> Option<&ScopeRule> {
        let key = compact_key(label);
        if key.is_empty() {
            return None;
        }
        self.rules.iter().find(|rule| rule.matches(&key))
    }

    pub fn rule_for_branch(&self, branch: &Branch) -> Option<&ScopeRule> {
        self.rules.iter().find(|rule| rule.branches.contains(branch))
    }

    pub fn scope_for(&self, user: &UserProfile) -> Scope {
        if self.is_admin(user) {
            return Scope::All;
        }
        if user.role != Role::Manager {
            return Scope::Nothing;
        }

        if let Some(rule) = self.rule_for_label(&user.branch_id) {
            return Scope::Limited {
                label: rule.name.clone(),
                branches: rule.branches.clone(),
                grades: rule.grades.clone(),
            };
        }

        let branch = Branch::canonicalize(&user.branch_id);
        if branch == Branch::Unknown {
            debug!("Manager {} has no branch assigned", user.email);
            return Scope::Nothing;
        }
        let grades = self
            .rule_for_branch(&branch)
            .map(|rule| rule.grades.clone())
            .unwrap_or_default();
        Scope::Limited {
            label: user.branch_id.trim().to_string(),
            branches: vec![branch],
            grades,
        }
    }

    /// Every grade label of every rule, in table order, without duplicates.
    pub fn all_grades(&self) -> Vec<ClassType> {
        let mut grades: Vec<ClassType> = Vec::new();
        for grade in self.rules.iter().flat_map(|r| r.grades.iter()) {
            if !grades.contains(grade) {
                grades.push(grade.clone());
            }
        }
        grades.sort_by_key(grade_order);
        grades
    }

    /// Canonical branches among `raw_labels` that `user` may see, first-seen order.
    pub fn visible_branches<S: AsRef<str>>(&self, user: &UserProfile, raw_labels: &[S]) -> Vec<Branch> {
        let scope = self.scope_for(user);
        let mut visible: Vec<Branch> = Vec::new();
        for label in raw_labels {
            let branch = Branch::canonicalize(label.as_ref());
            if scope.allows_branch(&branch) && !visible.contains(&branch) {
                visible.push(branch);
            }
        }
        visible
    }

    /// Class labels meaningful for `selected` (or for the whole scope when nothing is
    /// selected), limited to what the user may see.
    pub fn class_options(&self, user: &UserProfile, selected: Option<&Branch>) -> Vec<ClassType> {
        let context = selected.and_then(|b| self.rule_for_branch(b));
        match self.scope_for(user) {
            Scope::All => context
                .map(|rule| rule.grades.clone())
                .unwrap_or_else(|| self.all_grades()),
            Scope::Limited {
                branches, grades, ..
            } => match selected {
                Some(branch) if !branches.contains(branch) => Vec::new(),
                _ => match context {
                    Some(rule) => grades
                        .into_iter()
                        .filter(|g| rule.grades.contains(g))
                        .collect(),
                    None => grades,
                },
            },
            Scope::Nothing => Vec::new(),
        }
    }

    pub fn scope_records<'a>(
        &self,
        user: &UserProfile,
        records: &'a [EnrollmentRecord],
    ) -> Vec<&'a EnrollmentRecord> {
        let scope = self.scope_for(user);
        let rows: Vec<&EnrollmentRecord> = records
            .iter()
            .filter(|r| scope.allows_branch(&r.branch))
            .collect();
        debug!(
            "Scoped {} of {} records for {}",
            rows.len(),
            records.len(),
            user.email
        );
        rows
    }
}

fn grade_order(grade: &ClassType) -> (u32, u32) {
    match (grade.grade(), grade.as_str()) {
        (_, "Ana Sınıfı") => (0, 0),
        (Some(n), _) => (1, n),
        (None, "Mezun") => (2, 0),
        (None, "Akademi") => (2, 1),
        (None, "MOOD") => (2, 2),
        (None, _) => (3, 0),
    }
}

/// Branch + class selection state of a filter bar. Changing the branch clears the class
/// selection because the valid class set changes with it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedSelection {
    branch: Option<Branch>,
    class_types: Vec<ClassType>,
    options: Vec<ClassType>,
}

impl ScopedSelection {
    pub fn new(policy: &AccessPolicy, user: &UserProfile) -> Self {
        Self {
            branch: None,
            class_types: Vec::new(),
            options: policy.class_options(user, None),
        }
    }

    pub fn branch(&self) -> Option<&Branch> {
        self.branch.as_ref()
    }

    pub fn class_types(&self) -> &[ClassType] {
        &self.class_types
    }

    pub fn options(&self) -> &[ClassType] {
        &self.options
    }

    pub fn select_branch(
        &mut self,
        policy: &AccessPolicy,
        user: &UserProfile,
        branch: Option<&str>,
    ) -> Result<()> {
        let branch = branch
            .map(Branch::canonicalize)
            .filter(|b| *b != Branch::Unknown);
        if let Some(b) = &branch {
            if !policy.scope_for(user).allows_branch(b) {
                return Err(AnalyticsError::BranchNotVisible(b.to_string()));
            }
        }

        self.branch = branch;
        self.class_types.clear();
        self.options = policy.class_options(user, self.branch.as_ref());
        Ok(())
    }

    /// Adds the class to the selection, or removes it when already selected.
    pub fn toggle_class(&mut self, raw: &str) -> Result<()> {
        let class_type = ClassType::normalize(raw);
        if !self.options.contains(&class_type) {
            return Err(AnalyticsError::ClassNotSelectable {
                class_type: class_type.to_string(),
            });
        }
        if let Some(pos) = self.class_types.iter().position(|c| *c == class_type) {
            self.class_types.remove(pos);
        } else {
            self.class_types.push(class_type);
        }
        Ok(())
    }

    pub fn to_filter(&self, period: PeriodSpec) -> RecordFilter {
        RecordFilter {
            period,
            branch: self.branch.clone(),
            class_types: self.class_types.clone(),
        }
    }
}
