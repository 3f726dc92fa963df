//! Built-in feature definitions.

/// A named feature and the routes, handlers and tables that make it up.
///
/// Route and endpoint patterns use the router syntax: `[id]` is one segment,
/// `[...rest]` one or more, `[[...rest]]` zero or more.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureDefinition {
    pub slug: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub routes: &'static [&'static str],
    pub endpoints: &'static [&'static str],
    pub tables: &'static [&'static str],
}

pub const FEATURE_CATALOG: &[FeatureDefinition] = &[
    FeatureDefinition {
        slug: "authentication",
        name: "Authentication",
        description: "Sign-up, sign-in and session management.",
        routes: &[
            "/login",
            "/signin",
            "/sign-in/[[...rest]]",
            "/signup",
            "/sign-up/[[...rest]]",
            "/register",
            "/logout",
            "/auth/[...rest]",
            "/forgot-password",
            "/reset-password",
        ],
        endpoints: &["/api/auth/[...rest]", "/auth/[...rest]"],
        tables: &["profiles", "users", "sessions", "accounts"],
    },
    FeatureDefinition {
        slug: "dashboard",
        name: "Dashboard",
        description: "Landing view for signed-in users.",
        routes: &["/dashboard/[[...rest]]"],
        endpoints: &["/api/dashboard/[[...rest]]", "/api/stats/[[...rest]]"],
        tables: &[],
    },
    FeatureDefinition {
        slug: "projects",
        name: "Projects",
        description: "Create, browse and manage projects.",
        routes: &["/projects/[[...rest]]"],
        endpoints: &["/api/projects/[[...rest]]"],
        tables: &["projects", "project_members"],
    },
    FeatureDefinition {
        slug: "tasks",
        name: "Tasks",
        description: "Task lists and task tracking.",
        routes: &["/tasks/[[...rest]]", "/todos/[[...rest]]"],
        endpoints: &["/api/tasks/[[...rest]]", "/api/todos/[[...rest]]"],
        tables: &["tasks", "todos"],
    },
    FeatureDefinition {
        slug: "billing",
        name: "Billing",
        description: "Plans, checkout and subscription management.",
        routes: &[
            "/billing/[[...rest]]",
            "/pricing",
            "/checkout/[[...rest]]",
            "/subscription/[[...rest]]",
        ],
        endpoints: &[
            "/api/billing/[[...rest]]",
            "/api/checkout/[[...rest]]",
            "/api/stripe/[[...rest]]",
            "/api/webhooks/stripe",
        ],
        tables: &["subscriptions", "customers", "prices", "products", "invoices"],
    },
    FeatureDefinition {
        slug: "settings",
        name: "Settings",
        description: "Account and profile settings.",
        routes: &["/settings/[[...rest]]", "/account/[[...rest]]", "/profile/[[...rest]]"],
        endpoints: &[
            "/api/settings/[[...rest]]",
            "/api/account/[[...rest]]",
            "/api/profile/[[...rest]]",
        ],
        tables: &["profiles", "settings", "preferences"],
    },
    FeatureDefinition {
        slug: "team",
        name: "Team Management",
        description: "Teams, members and invitations.",
        routes: &["/team/[[...rest]]", "/teams/[[...rest]]", "/invite/[[...rest]]"],
        endpoints: &["/api/team/[[...rest]]", "/api/teams/[[...rest]]", "/api/invite/[[...rest]]"],
        tables: &["teams", "team_members", "invitations", "memberships"],
    },
    FeatureDefinition {
        slug: "chat",
        name: "Chat",
        description: "Conversations and messaging.",
        routes: &["/chat/[[...rest]]", "/messages/[[...rest]]"],
        endpoints: &["/api/chat/[[...rest]]", "/api/messages/[[...rest]]", "/functions/v1/chat"],
        tables: &["messages", "conversations", "chats"],
    },
    FeatureDefinition {
        slug: "onboarding",
        name: "Onboarding",
        description: "First-run setup for new users.",
        routes: &["/onboarding/[[...rest]]", "/welcome"],
        endpoints: &["/api/onboarding/[[...rest]]"],
        tables: &[],
    },
    FeatureDefinition {
        slug: "notifications",
        name: "Notifications",
        description: "In-app and email notifications.",
        routes: &["/notifications/[[...rest]]"],
        endpoints: &["/api/notifications/[[...rest]]"],
        tables: &["notifications"],
    },
    FeatureDefinition {
        slug: "admin",
        name: "Administration",
        description: "Back-office tools for operators.",
        routes: &["/admin/[[...rest]]"],
        endpoints: &["/api/admin/[[...rest]]"],
        tables: &["audit_logs"],
    },
];
