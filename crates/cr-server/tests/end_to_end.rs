//! Hub and agent wired together without a network in between.

use cr_agent::memory::{MemoryDom, import_rule, style_rule};
use cr_agent::{AgentSession, PathNormalizer};
use cr_protocol::{ClientRequest, ServerEvent};
use cr_server::{Hub, HubCommand};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

const ORIGIN: &str = "http://localhost:8000";

struct Browser {
    id: Uuid,
    agent: AgentSession<MemoryDom>,
    events: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Browser {
    fn connect(hub: &mut Hub, dom: MemoryDom) -> Self {
        let id = Uuid::new_v4();
        let (sender, events) = mpsc::unbounded_channel();
        hub.handle(HubCommand::Connect {
            session: id,
            sender,
        });
        let mut browser = Self {
            id,
            agent: AgentSession::new(dom, PathNormalizer::new(ORIGIN, "/index.html")),
            events,
        };
        browser.pump(hub);
        browser
    }

    /// Deliver pending events to the agent and its requests to the hub
    /// until both sides are quiet.
    fn pump(&mut self, hub: &mut Hub) -> usize {
        let mut delivered = 0;
        loop {
            let mut progressed = false;
            while let Ok(event) = self.events.try_recv() {
                self.agent.handle(event);
                delivered += 1;
                progressed = true;
            }
            for request in self.agent.take_requests() {
                hub.handle(HubCommand::Request {
                    session: self.id,
                    request,
                });
                progressed = true;
            }
            if !progressed {
                return delivered;
            }
        }
    }
}

fn site() -> (TempDir, Hub) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("css")).unwrap();
    std::fs::write(
        dir.path().join("css/main.css"),
        "@import \"base.css\";\nmain { display: block; }\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("css/base.css"), "body { margin: 0; }\n").unwrap();
    std::fs::write(dir.path().join("css/other.css"), "p { }\n").unwrap();
    let hub = Hub::new(dir.path().to_path_buf(), None);
    (dir, hub)
}

fn main_css_page() -> MemoryDom {
    let mut dom = MemoryDom::new();
    dom.add_link(
        &format!("{ORIGIN}/css/main.css"),
        &[],
        vec![
            import_rule(
                "base.css",
                &format!("{ORIGIN}/css/base.css"),
                &[],
                vec![style_rule("body { margin: 0; }")],
            ),
            style_rule("main { display: block; }"),
        ],
    );
    dom
}

fn other_css_page() -> MemoryDom {
    let mut dom = MemoryDom::new();
    dom.add_link(&format!("{ORIGIN}/css/other.css"), &[], vec![]);
    dom
}

fn change(dir: &TempDir, hub: &mut Hub, relative: &str, content: &str) {
    let path = dir.path().join(relative);
    std::fs::write(&path, content).unwrap();
    hub.handle(HubCommand::FileChanged(path));
}

#[test]
fn test_imported_file_change_reaches_only_its_subscribers() {
    let (dir, mut hub) = site();
    let mut main = Browser::connect(&mut hub, main_css_page());
    let mut other = Browser::connect(&mut hub, other_css_page());

    assert_eq!(
        main.agent.dom().style_ids(),
        vec!["CR-/css/base.css", "CR-/css/main.css"]
    );
    let main_text = main.agent.dom().text_of("CR-/css/main.css").map(ToOwned::to_owned);

    change(&dir, &mut hub, "css/base.css", "body { margin: 1em; }\n");

    assert_eq!(main.pump(&mut hub), 1);
    assert_eq!(other.pump(&mut hub), 0);
    assert_eq!(
        main.agent.dom().text_of("CR-/css/base.css"),
        Some("body { margin: 1em; }\n")
    );
    assert_eq!(
        main.agent.dom().text_of("CR-/css/main.css").map(ToOwned::to_owned),
        main_text
    );
    assert!(main.agent.take_requests().is_empty());
}

#[test]
fn test_touch_without_change_is_silent() {
    let (dir, mut hub) = site();
    let mut main = Browser::connect(&mut hub, main_css_page());

    change(&dir, &mut hub, "css/base.css", "body { margin: 0; }\n");

    assert_eq!(main.pump(&mut hub), 0);
}

#[test]
fn test_new_import_is_loaded_on_the_fly() {
    let (dir, mut hub) = site();
    let mut main = Browser::connect(&mut hub, main_css_page());
    std::fs::write(dir.path().join("css/theme.css"), "h1 { color: teal; }\n").unwrap();

    change(
        &dir,
        &mut hub,
        "css/main.css",
        "@import \"base.css\";\n@import \"theme.css\";\nmain { display: block; }\n",
    );
    main.pump(&mut hub);

    assert_eq!(
        main.agent.dom().style_ids(),
        vec!["CR-/css/base.css", "CR-/css/theme.css", "CR-/css/main.css"]
    );
    assert_eq!(
        main.agent.dom().text_of("CR-/css/theme.css"),
        Some("h1 { color: teal; }\n")
    );
    assert!(
        hub.registry()
            .subscribers(&dir.path().join("css/theme.css"))
            .any(|s| s == main.id)
    );
}

#[test]
fn test_dropped_import_is_unsubscribed() {
    let (dir, mut hub) = site();
    let mut main = Browser::connect(&mut hub, main_css_page());

    change(&dir, &mut hub, "css/main.css", "main { display: grid; }\n");
    main.pump(&mut hub);
    assert_eq!(main.agent.dom().style_ids(), vec!["CR-/css/main.css"]);

    change(&dir, &mut hub, "css/base.css", "body { margin: 2em; }\n");
    assert_eq!(main.pump(&mut hub), 0);
}

#[test]
fn test_disconnected_browser_gets_nothing() {
    let (dir, mut hub) = site();
    let main = Browser::connect(&mut hub, main_css_page());
    let mut other = Browser::connect(&mut hub, main_css_page());

    hub.handle(HubCommand::Disconnect { session: main.id });
    drop(main);

    change(&dir, &mut hub, "css/base.css", "body { padding: 0; }\n");
    assert_eq!(other.pump(&mut hub), 1);
    assert_eq!(hub.session_count(), 1);
}

#[test]
fn test_requests_use_wire_format() {
    let json = serde_json::to_string(&ClientRequest::add_and_load("/css/a.css")).unwrap();
    let parsed: ClientRequest = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.path(), "/css/a.css");
}
