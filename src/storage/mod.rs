//!
//! quillpress content repository
//! -----------------------------
//! CRUD over the three entity tables (users, posts, comments), persisted as
//! one Parquet file per table under a configured root folder. Tables are
//! small: each operation reads the table into typed rows, applies the change
//! in Rust, and rewrites the file atomically.
//!
//! Key responsibilities:
//! - Uniqueness contracts: user email (case-insensitive) and post title.
//! - Referential integrity: comments always reference an existing post and
//!   author; deleting a post cascade-deletes its comments.
//! - Monotonic id allocation with a persisted high-water mark per table, so
//!   ids are never reused even after deletes.
//!
//! The public API centers around the `Store` type, wrapped in a thread-safe
//! `SharedStore` (`Arc<Mutex<Store>>`). Holding the mutex across a check and
//! its write is the transaction boundary: a constraint violation leaves the
//! table file untouched, and concurrent writers are serialized so the store,
//! not the caller, arbitrates uniqueness races.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing::debug;

mod io;
mod models;

pub use models::{BlogPost, Comment, PostDraft, User};

use crate::error::{AppError, AppResult};

const USERS_TABLE: &str = "users";
const POSTS_TABLE: &str = "posts";
const COMMENTS_TABLE: &str = "comments";

/// On-disk repository handle rooted at a folder holding the table files.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Create a new Store rooted at the given filesystem path.
    /// The directory is created if it does not already exist.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .with_context(|| format!("create store root {}", root.display()))?;
        Ok(Self { root })
    }

    /// Return the configured root folder for this Store.
    pub fn root_path(&self) -> &PathBuf {
        &self.root
    }

    fn load_users(&self) -> AppResult<Vec<User>> {
        match self.read_table(USERS_TABLE).map_err(AppError::from)? {
            Some(df) => models::users_from_df(&df).map_err(AppError::from),
            None => Ok(Vec::new()),
        }
    }

    fn load_posts(&self) -> AppResult<Vec<BlogPost>> {
        match self.read_table(POSTS_TABLE).map_err(AppError::from)? {
            Some(df) => models::posts_from_df(&df).map_err(AppError::from),
            None => Ok(Vec::new()),
        }
    }

    fn load_comments(&self) -> AppResult<Vec<Comment>> {
        match self.read_table(COMMENTS_TABLE).map_err(AppError::from)? {
            Some(df) => models::comments_from_df(&df).map_err(AppError::from),
            None => Ok(Vec::new()),
        }
    }

    fn store_users(&self, users: &[User]) -> AppResult<()> {
        let df = models::users_to_df(users).map_err(AppError::from)?;
        self.write_table(USERS_TABLE, df).map_err(AppError::from)
    }

    fn store_posts(&self, posts: &[BlogPost]) -> AppResult<()> {
        let df = models::posts_to_df(posts).map_err(AppError::from)?;
        self.write_table(POSTS_TABLE, df).map_err(AppError::from)
    }

    fn store_comments(&self, comments: &[Comment]) -> AppResult<()> {
        let df = models::comments_to_df(comments).map_err(AppError::from)?;
        self.write_table(COMMENTS_TABLE, df).map_err(AppError::from)
    }

    // ---- users ----

    /// Insert a new user. The email must be unique (compared
    /// case-insensitively); a duplicate fails without touching the table.
    pub fn insert_user(&self, name: &str, email: &str, password_hash: &str) -> AppResult<User> {
        let mut users = self.load_users()?;
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(AppError::duplicate_email(
                "duplicate_email",
                "an account with this email already exists",
            ));
        }
        let id = self.allocate_id(USERS_TABLE).map_err(AppError::from)?;
        let user = User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
        };
        users.push(user.clone());
        self.store_users(&users)?;
        debug!(target: "quillpress::storage", "insert_user: id={} email_domain={:?}", user.id, email.rsplit('@').next());
        Ok(user)
    }

    pub fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let users = self.load_users()?;
        Ok(users.into_iter().find(|u| u.email.eq_ignore_ascii_case(email)))
    }

    pub fn get_user(&self, id: i64) -> AppResult<Option<User>> {
        let users = self.load_users()?;
        Ok(users.into_iter().find(|u| u.id == id))
    }

    /// The administrator is the user with the minimum id ever assigned.
    pub fn admin_user_id(&self) -> AppResult<Option<i64>> {
        let users = self.load_users()?;
        Ok(users.iter().map(|u| u.id).min())
    }

    // ---- posts ----

    /// Create a post. The title must be globally unique; the creation date is
    /// stamped here and never mutated on edit.
    pub fn create_post(&self, draft: &PostDraft, author_id: i64) -> AppResult<BlogPost> {
        let mut posts = self.load_posts()?;
        if posts.iter().any(|p| p.title == draft.title) {
            return Err(AppError::duplicate_title(
                "duplicate_title",
                "a post with this title already exists",
            ));
        }
        let id = self.allocate_id(POSTS_TABLE).map_err(AppError::from)?;
        let post = BlogPost {
            id,
            title: draft.title.clone(),
            subtitle: draft.subtitle.clone(),
            body: draft.body.clone(),
            img_url: draft.img_url.clone(),
            date: chrono::Utc::now().format("%B %d, %Y").to_string(),
            author_id,
        };
        posts.push(post.clone());
        self.store_posts(&posts)?;
        debug!(target: "quillpress::storage", "create_post: id={} author_id={}", post.id, author_id);
        Ok(post)
    }

    /// Overwrite the mutable fields of a post. The id and creation date are
    /// preserved; the author is re-stamped to `new_author_id` (the editing
    /// principal). Renaming onto another post's title is a conflict.
    pub fn update_post(&self, id: i64, draft: &PostDraft, new_author_id: i64) -> AppResult<BlogPost> {
        let mut posts = self.load_posts()?;
        if posts.iter().any(|p| p.id != id && p.title == draft.title) {
            return Err(AppError::duplicate_title(
                "duplicate_title",
                "a post with this title already exists",
            ));
        }
        let Some(post) = posts.iter_mut().find(|p| p.id == id) else {
            return Err(AppError::not_found("post_not_found", "no such post"));
        };
        post.title = draft.title.clone();
        post.subtitle = draft.subtitle.clone();
        post.body = draft.body.clone();
        post.img_url = draft.img_url.clone();
        post.author_id = new_author_id;
        let updated = post.clone();
        self.store_posts(&posts)?;
        debug!(target: "quillpress::storage", "update_post: id={} author_id={}", id, new_author_id);
        Ok(updated)
    }

    /// Delete a post and cascade-delete its comments. The comments table is
    /// rewritten before the post row is removed, so a partial failure can
    /// strand a post without comments but never an orphan comment.
    pub fn delete_post(&self, id: i64) -> AppResult<()> {
        let mut posts = self.load_posts()?;
        if !posts.iter().any(|p| p.id == id) {
            return Err(AppError::not_found("post_not_found", "no such post"));
        }
        let comments = self.load_comments()?;
        let kept: Vec<Comment> = comments.into_iter().filter(|c| c.post_id != id).collect();
        self.store_comments(&kept)?;
        posts.retain(|p| p.id != id);
        self.store_posts(&posts)?;
        debug!(target: "quillpress::storage", "delete_post: id={}", id);
        Ok(())
    }

    pub fn get_post(&self, id: i64) -> AppResult<BlogPost> {
        let posts = self.load_posts()?;
        posts
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::not_found("post_not_found", "no such post"))
    }

    /// All posts in stable insertion (id) order.
    pub fn list_posts(&self) -> AppResult<Vec<BlogPost>> {
        let mut posts = self.load_posts()?;
        posts.sort_by_key(|p| p.id);
        Ok(posts)
    }

    // ---- comments ----

    /// Append a comment to an existing post. A missing post is NotFound; the
    /// author id comes from the validated session, never from the client.
    pub fn add_comment(&self, post_id: i64, author_id: i64, text: &str) -> AppResult<Comment> {
        let posts = self.load_posts()?;
        if !posts.iter().any(|p| p.id == post_id) {
            return Err(AppError::not_found("post_not_found", "no such post"));
        }
        let mut comments = self.load_comments()?;
        let id = self.allocate_id(COMMENTS_TABLE).map_err(AppError::from)?;
        let comment = Comment { id, text: text.to_string(), author_id, post_id };
        comments.push(comment.clone());
        self.store_comments(&comments)?;
        Ok(comment)
    }

    /// Comments for a post in stable insertion (id) order.
    pub fn list_comments(&self, post_id: i64) -> AppResult<Vec<Comment>> {
        let mut comments = self.load_comments()?;
        comments.retain(|c| c.post_id == post_id);
        comments.sort_by_key(|c| c.id);
        Ok(comments)
    }
}

/// Thread-safe shared handle over a `Store`. One lock acquisition spans a
/// request's check-then-write sequence.
#[derive(Clone)]
pub struct SharedStore(pub Arc<Mutex<Store>>);

impl SharedStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Ok(Self(Arc::new(Mutex::new(Store::new(root)?))))
    }

    pub fn root_path(&self) -> PathBuf {
        // Safe because we only clone; no long-lived borrow
        self.0.lock().root_path().clone()
    }
}
