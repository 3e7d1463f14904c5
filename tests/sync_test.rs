//! Integration tests running the sync pipeline against a stub portal.

use std::{
    collections::HashMap,
    io,
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use axum::{
    Form, Router,
    body::{Body, Bytes},
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use tokio::net::TcpListener;
use url::Url;

use coursesync::{
    CourseCode, CourseEntry, Config, Error, Session, Synchronizer, download_log::read_log,
    walk_course,
};

const SESSION_COOKIE: &str = "MoodleSession=guest-session";

const INDEX: &str = r#"<html><body>
  <div class="subcategories">
    <a href="/bits-cms/course/view.php?id=11">CS F211 - Data Structures</a>
    <a href="/bits-cms/course/view.php?id=12">BIO F110 - Biology</a>
    <a href="/bits-cms/course/view.php?id=13">MATH F113 - Discrete Math</a>
    <a href="/bits-cms/course/view.php?id=14">CHEM F111 - General Chemistry</a>
    <a href="/bits-cms/course/view.php?id=15">PHY F111 - Mechanics</a>
    <a href="/bits-cms/course/view.php?id=16">EEE F215 - Electronics</a>
  </div>
</body></html>"#;

const DATA_STRUCTURES: &str = r##"<html><body>
  <div class="course_category_tree">
    <a href="#">Expand all</a>
    <a class="section" href="/bits-cms/course/section.php?id=1">Handouts</a>
  </div>
</body></html>"##;

const NO_TREE: &str = "<html><body><p>This course has no content yet.</p></body></html>";

const CHEMISTRY: &str = r#"<html><body>
  <div class="course_category_tree">
    <a class="section" href="/bits-cms/course/section.php?id=2">Labs</a>
  </div>
</body></html>"#;

const MECHANICS: &str = r#"<html><body>
  <div class="course_category_tree">
    <a class="section" href="/bits-cms/course/section.php?id=3">Lectures</a>
  </div>
</body></html>"#;

const ELECTRONICS: &str = r#"<html><body>
  <div class="course_category_tree">
    <a class="section" href="/bits-cms/course/section.php?id=4">Notes</a>
  </div>
</body></html>"#;

const LECTURES: &str = r#"<html><body>
  <ul class="topics">
    <li><a href="/bits-cms/mod/resource/view.php?id=301">Lecture 1</a></li>
    <li><a href="/bits-cms/mod/resource/view.php?id=302">Recording</a></li>
  </ul>
</body></html>"#;

const NOTES: &str = r#"<html><body>
  <ul class="topics">
    <li><a href="/bits-cms/mod/resource/view.php?id=401">Notes</a></li>
  </ul>
</body></html>"#;

/// Chunks of the slow file and the pause before each.
const SLOW_CHUNKS: usize = 6;
const SLOW_PAUSE: Duration = Duration::from_millis(200);

const HANDOUTS: &str = r#"<html><body>
  <ul class="topics">
    <li><a href="/bits-cms/mod/resource/view.php?id=101&redirect=1">Handout</a></li>
    <li><a href="/bits-cms/mod/resource/view.php?id=102&redirect=1">Lecture 1</a></li>
  </ul>
</body></html>"#;

const LABS: &str = r#"<html><body>
  <ul class="topics">
    <li><a href="/bits-cms/mod/resource/view.php?id=201">Lab 1</a></li>
    <li><a href="/bits-cms/mod/resource/view.php?id=202">Lab 2</a></li>
  </ul>
</body></html>"#;

/// Records which file identities were requested.
#[derive(Default)]
struct Portal {
    fetched: Mutex<Vec<String>>,
    /// Set once the first transfer of file 401 has been cut off.
    dropped_once: AtomicBool,
}

impl Portal {
    fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

type Params = Query<HashMap<String, String>>;

async fn login(Form(form): Form<HashMap<String, String>>) -> Response {
    let is_guest = form.get("username").map(String::as_str) == Some("guest")
        && form.get("password").map(String::as_str) == Some("guest");
    if !is_guest {
        return StatusCode::FORBIDDEN.into_response();
    }
    (
        [(header::SET_COOKIE, format!("{SESSION_COOKIE}; Path=/"))],
        "You are logged in as guest",
    )
        .into_response()
}

async fn index(headers: HeaderMap) -> Response {
    let has_session = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|c| c.contains(SESSION_COOKIE));
    if has_session {
        Html(INDEX).into_response()
    } else {
        StatusCode::FORBIDDEN.into_response()
    }
}

async fn course(Query(params): Params) -> Response {
    match params.get("id").map(String::as_str) {
        Some("11") => Html(DATA_STRUCTURES).into_response(),
        Some("13") => Html(NO_TREE).into_response(),
        Some("14") => Html(CHEMISTRY).into_response(),
        Some("15") => Html(MECHANICS).into_response(),
        Some("16") => Html(ELECTRONICS).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn section(Query(params): Params) -> Response {
    match params.get("id").map(String::as_str) {
        Some("1") => Html(HANDOUTS).into_response(),
        Some("2") => Html(LABS).into_response(),
        Some("3") => Html(LECTURES).into_response(),
        Some("4") => Html(NOTES).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn resource(State(portal): State<Arc<Portal>>, Query(params): Params) -> Response {
    let id = params.get("id").cloned().unwrap_or_default();
    portal.fetched.lock().unwrap().push(id.clone());

    let attachment = |name: &str| {
        [(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_bytes(format!("attachment; filename=\"{name}\"").as_bytes())
                .unwrap(),
        )]
    };

    match id.as_str() {
        // Lab 2 is served without a filename.
        "202" => return format!("contents of {id}").into_response(),
        // Raw UTF-8 in the header, as the portal sends it.
        "301" => return (attachment("Lécture 1.pdf"), "contents of 301").into_response(),
        "302" => {
            let chunks = futures::stream::unfold(0, |i| async move {
                if i == SLOW_CHUNKS {
                    return None;
                }
                tokio::time::sleep(SLOW_PAUSE).await;
                Some((Ok::<_, io::Error>(Bytes::from(vec![b'x'; 1024])), i + 1))
            });
            return (attachment("recording.mp4"), Body::from_stream(chunks)).into_response();
        }
        "401" if !portal.dropped_once.swap(true, Ordering::SeqCst) => {
            let chunks = futures::stream::iter([
                Ok(Bytes::from_static(b"partial ")),
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "dropped")),
            ]);
            return (attachment("notes.pdf"), Body::from_stream(chunks)).into_response();
        }
        "401" => return (attachment("notes.pdf"), "complete notes").into_response(),
        _ => {}
    }
    (
        [(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"file-{id}.pdf\""),
        )],
        format!("contents of {id}"),
    )
        .into_response()
}

async fn spawn_portal() -> (String, Arc<Portal>) {
    let portal = Arc::new(Portal::default());
    let app = Router::new()
        .route("/bits-cms/login/index.php", post(login))
        .route("/bits-cms/", get(index))
        .route("/bits-cms/course/view.php", get(course))
        .route("/bits-cms/course/section.php", get(section))
        .route("/bits-cms/mod/resource/view.php", get(resource))
        .with_state(portal.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), portal)
}

fn codes(list: &[&str]) -> Vec<CourseCode> {
    list.iter().map(|c| c.parse().unwrap()).collect()
}

async fn configure(root: &Path, portal: &str, courses: &[&str]) -> Config {
    let config = Config::new(root, portal).unwrap();
    config.courses().add(&codes(courses)).await.unwrap();
    config
}

async fn logged(dir: &Path) -> Vec<String> {
    read_log(dir)
        .await
        .unwrap()
        .iter()
        .map(|id| id.to_string())
        .collect()
}

#[tokio::test]
async fn test_only_new_file_is_fetched() {
    let (portal_url, portal) = spawn_portal().await;
    let root = tempfile::tempdir().unwrap();
    let config = configure(root.path(), &portal_url, &["CS F211"]).await;

    let course_dir = root.path().join("CS F211 - Data Structures");
    std::fs::create_dir_all(&course_dir).unwrap();
    std::fs::write(course_dir.join(".log"), "101\n").unwrap();

    let report = Synchronizer::new(config).unwrap().run().await.unwrap();

    assert_eq!(portal.fetched(), ["102"]);
    assert_eq!(report.downloaded(), 1);
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.courses[0].downloaded, ["file-102.pdf"]);
    assert_eq!(
        std::fs::read_to_string(course_dir.join("file-102.pdf")).unwrap(),
        "contents of 102"
    );
    assert!(!course_dir.join("file-101.pdf").exists());
    assert_eq!(logged(&course_dir).await, ["101", "102"]);
}

#[tokio::test]
async fn test_second_run_fetches_nothing() {
    let (portal_url, portal) = spawn_portal().await;
    let root = tempfile::tempdir().unwrap();
    let config = configure(root.path(), &portal_url, &["CS F211"]).await;
    let sync = Synchronizer::new(config).unwrap();

    let first = sync.run().await.unwrap();
    assert_eq!(first.downloaded(), 2);
    assert_eq!(portal.fetched().len(), 2);

    let second = sync.run().await.unwrap();
    assert_eq!(second.downloaded(), 0);
    assert_eq!(second.skipped(), 2);
    assert_eq!(portal.fetched().len(), 2);

    let course_dir = root.path().join("CS F211 - Data Structures");
    assert_eq!(logged(&course_dir).await, ["101", "102"]);
}

#[tokio::test]
async fn test_course_walker_is_idempotent() {
    let (portal_url, portal) = spawn_portal().await;
    let root = tempfile::tempdir().unwrap();
    let config = Config::new(root.path(), &portal_url).unwrap();
    let session = Session::new(&config).unwrap();
    session.login().await.unwrap();

    let course = CourseEntry {
        code: "CS F211".parse().unwrap(),
        name: "Data Structures".into(),
        link: Url::parse(&format!("{portal_url}/bits-cms/course/view.php?id=11")).unwrap(),
    };

    let first = walk_course(&session, &course, root.path()).await.unwrap();
    assert_eq!(first.sections, 1);
    assert_eq!(first.downloaded.len(), 2);

    let second = walk_course(&session, &course, root.path()).await.unwrap();
    assert!(second.downloaded.is_empty());
    assert_eq!(second.skipped, 2);
    assert_eq!(portal.fetched(), ["101", "102"]);
}

#[tokio::test]
async fn test_unmatched_and_empty_courses() {
    let (portal_url, portal) = spawn_portal().await;
    let root = tempfile::tempdir().unwrap();
    let config = configure(root.path(), &portal_url, &["MATH F113", "EEE F111"]).await;

    let report = Synchronizer::new(config).unwrap().run().await.unwrap();

    assert_eq!(report.unmatched, codes(&["EEE F111"]));
    assert!(report.failed.is_empty());
    assert_eq!(report.courses.len(), 1);
    assert_eq!(report.courses[0].code.as_str(), "MATH F113");
    assert_eq!(report.courses[0].sections, 0);
    assert!(portal.fetched().is_empty());
    assert!(!root.path().join("MATH F113 - Discrete Math").exists());
}

#[tokio::test]
async fn test_file_without_name_does_not_stop_siblings() {
    let (portal_url, portal) = spawn_portal().await;
    let root = tempfile::tempdir().unwrap();
    let config = configure(root.path(), &portal_url, &["CHEM F111"]).await;

    let report = Synchronizer::new(config).unwrap().run().await.unwrap();

    assert_eq!(portal.fetched(), ["201", "202"]);
    let chemistry = &report.courses[0];
    assert_eq!(chemistry.downloaded, ["file-201.pdf"]);
    assert_eq!(chemistry.failed, 1);

    let course_dir = root.path().join("CHEM F111 - General Chemistry");
    assert_eq!(logged(&course_dir).await, ["201"]);
}

#[tokio::test]
async fn test_unreachable_portal_is_fatal() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let root = tempfile::tempdir().unwrap();
    let config = configure(root.path(), &format!("http://{addr}"), &["CS F211"]).await;

    let result = Synchronizer::new(config).unwrap().run().await;
    assert!(matches!(result, Err(Error::Http(_))));
}

#[tokio::test]
async fn test_missing_course_list_is_reported() {
    let (portal_url, _portal) = spawn_portal().await;
    let root = tempfile::tempdir().unwrap();
    let config = Config::new(root.path(), &portal_url).unwrap();

    let result = Synchronizer::new(config).unwrap().run().await;
    assert!(matches!(result, Err(Error::CourseListMissing(_))));
}

#[tokio::test]
async fn test_slow_transfer_outlasting_timeout_completes() {
    let (portal_url, portal) = spawn_portal().await;
    let root = tempfile::tempdir().unwrap();
    let config = configure(root.path(), &portal_url, &["PHY F111"])
        .await
        .with_timeout(Duration::from_millis(500));

    let report = Synchronizer::new(config).unwrap().run().await.unwrap();

    assert_eq!(portal.fetched(), ["301", "302"]);
    assert_eq!(report.courses[0].failed, 0);
    let course_dir = root.path().join("PHY F111 - Mechanics");
    let recording = std::fs::metadata(course_dir.join("recording.mp4")).unwrap();
    assert_eq!(recording.len(), (SLOW_CHUNKS * 1024) as u64);
    assert_eq!(logged(&course_dir).await, ["301", "302"]);
}

#[tokio::test]
async fn test_non_ascii_filename_is_kept() {
    let (portal_url, _portal) = spawn_portal().await;
    let root = tempfile::tempdir().unwrap();
    let config = configure(root.path(), &portal_url, &["PHY F111"]).await;

    let report = Synchronizer::new(config).unwrap().run().await.unwrap();

    assert!(report.courses[0].downloaded.contains(&"Lécture 1.pdf".to_string()));
    let course_dir = root.path().join("PHY F111 - Mechanics");
    assert_eq!(
        std::fs::read_to_string(course_dir.join("Lécture 1.pdf")).unwrap(),
        "contents of 301"
    );
}

#[tokio::test]
async fn test_interrupted_transfer_is_refetched_in_full() {
    let (portal_url, portal) = spawn_portal().await;
    let root = tempfile::tempdir().unwrap();
    let config = configure(root.path(), &portal_url, &["EEE F215"]).await;
    let sync = Synchronizer::new(config).unwrap();
    let course_dir = root.path().join("EEE F215 - Electronics");

    let first = sync.run().await.unwrap();
    assert!(first.courses[0].downloaded.is_empty());
    assert_eq!(first.courses[0].failed, 1);
    assert!(logged(&course_dir).await.is_empty());

    let second = sync.run().await.unwrap();
    assert_eq!(second.courses[0].downloaded, ["notes.pdf"]);
    assert_eq!(portal.fetched(), ["401", "401"]);
    assert_eq!(
        std::fs::read_to_string(course_dir.join("notes.pdf")).unwrap(),
        "complete notes"
    );
    assert_eq!(logged(&course_dir).await, ["401"]);
}
