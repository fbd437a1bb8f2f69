//! Page inspection: visitor classification and page-name resolution.

use beacon_protocol::UserType;
use parking_lot::Mutex;

/// Read access to the current document, injected by the host.
///
/// Backed by `window.location` / `document` in a real browser; by
/// [`FakePageContext`] in tests.
pub trait PageContext: Send + Sync {
    /// Current pathname, e.g. `/products/123`.
    fn path(&self) -> String;
    /// Current document title.
    fn title(&self) -> String;
    /// Full URL for page-view reports.
    fn url(&self) -> String;
    /// Hostname (with optional port), for base-URL resolution.
    fn host(&self) -> String;
    /// Whether known admin-area marker elements are present in the DOM.
    fn has_admin_markers(&self) -> bool;
}

/// Classify the current visitor from admin-area signals.
///
/// Any one signal is enough: an `admin` path, an "Admin" title, or admin
/// marker elements in the document.
pub fn classify_user(page: &dyn PageContext) -> UserType {
    let path = page.path();
    if path.starts_with("/admin") || path.contains("admin") {
        return UserType::Admin;
    }
    if page.title().contains("Admin") || page.has_admin_markers() {
        return UserType::Admin;
    }
    UserType::User
}

/// Known static routes and their display names.
const STATIC_ROUTES: &[(&str, &str)] = &[
    ("/", "Home"),
    ("/products", "Products"),
    ("/blog", "Blog"),
    ("/about", "About"),
    ("/contact", "Contact"),
    ("/cart", "Cart"),
    ("/checkout", "Checkout"),
];

/// Resolve a human-readable page name for a path.
///
/// Resolution order: static route table, admin rule (strip `/admin`,
/// title-case the remainder, `Dashboard` for the bare root), detail-page
/// families (`/products/…`, `/blog/…`), then the document title with the
/// site-name suffix stripped.
pub fn page_name(path: &str, title: &str, site_suffix: &str) -> String {
    let path = normalize(path);

    if let Some((_, name)) = STATIC_ROUTES.iter().find(|(route, _)| *route == path) {
        return (*name).to_string();
    }

    if let Some(rest) = path.strip_prefix("/admin") {
        let rest = rest.trim_matches('/');
        return if rest.is_empty() {
            "Admin - Dashboard".to_string()
        } else {
            format!("Admin - {}", title_case(rest))
        };
    }

    if path.starts_with("/products/") {
        return "Product Detail".to_string();
    }
    if path.starts_with("/blog/") {
        return "Blog Post".to_string();
    }

    title.strip_suffix(site_suffix).unwrap_or(title).to_string()
}

/// Drop query/hash and any trailing slash so `/products/` matches `/products`.
fn normalize(path: &str) -> &str {
    let path = path
        .split_once(['?', '#'])
        .map_or(path, |(before, _)| before);
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

/// Title-case a path remainder: `orders` -> `Orders`,
/// `design-studio/logos` -> `Design Studio Logos`.
fn title_case(segment: &str) -> String {
    segment
        .split(['/', '-'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Scriptable [`PageContext`] for tests and non-browser hosts.
pub struct FakePageContext {
    inner: Mutex<FakePage>,
}

struct FakePage {
    path: String,
    title: String,
    host: String,
    admin_markers: bool,
}

impl FakePageContext {
    pub fn new(path: &str, title: &str) -> Self {
        Self {
            inner: Mutex::new(FakePage {
                path: path.to_string(),
                title: title.to_string(),
                host: "localhost".to_string(),
                admin_markers: false,
            }),
        }
    }

    /// Simulate a client-side navigation.
    pub fn navigate(&self, path: &str, title: &str) {
        let mut page = self.inner.lock();
        page.path = path.to_string();
        page.title = title.to_string();
    }

    pub fn set_host(&self, host: &str) {
        self.inner.lock().host = host.to_string();
    }

    pub fn set_admin_markers(&self, present: bool) {
        self.inner.lock().admin_markers = present;
    }
}

impl PageContext for FakePageContext {
    fn path(&self) -> String {
        self.inner.lock().path.clone()
    }

    fn title(&self) -> String {
        self.inner.lock().title.clone()
    }

    fn url(&self) -> String {
        let page = self.inner.lock();
        format!("https://{}{}", page.host, page.path)
    }

    fn host(&self) -> String {
        self.inner.lock().host.clone()
    }

    fn has_admin_markers(&self) -> bool {
        self.inner.lock().admin_markers
    }
}
