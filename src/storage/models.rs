//! Typed row models for the three entity tables and their DataFrame
//! conversions. Each table is read fully into a Vec of rows, mutated in
//! plain Rust, and rewritten as a whole; the conversions here are the only
//! place column names and dtypes appear.

use anyhow::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// A registered account. Write-once after creation; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string, never the raw password.
    pub password_hash: String,
}

/// A published post. `date` is stamped at creation and preserved on edit;
/// `author_id` is re-stamped to the editing principal on every edit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlogPost {
    pub id: i64,
    pub title: String,
    pub subtitle: String,
    pub body: String,
    pub img_url: String,
    pub date: String,
    pub author_id: i64,
}

/// A comment under a post. Never edited or deleted individually; removed
/// only by the cascade when its post is deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub author_id: i64,
    pub post_id: i64,
}

/// Mutable post fields as submitted by the create/edit form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostDraft {
    pub title: String,
    pub subtitle: String,
    pub body: String,
    pub img_url: String,
}

fn av_str(av: AnyValue) -> String {
    match av {
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        _ => String::new(),
    }
}

pub(crate) fn users_to_df(users: &[User]) -> Result<DataFrame> {
    let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
    let names: Vec<String> = users.iter().map(|u| u.name.clone()).collect();
    let emails: Vec<String> = users.iter().map(|u| u.email.clone()).collect();
    let hashes: Vec<String> = users.iter().map(|u| u.password_hash.clone()).collect();
    let df = DataFrame::new(vec![
        Series::new("id".into(), ids).into(),
        Series::new("name".into(), names).into(),
        Series::new("email".into(), emails).into(),
        Series::new("password_hash".into(), hashes).into(),
    ])?;
    Ok(df)
}

pub(crate) fn users_from_df(df: &DataFrame) -> Result<Vec<User>> {
    let ids = df.column("id")?.i64()?;
    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        out.push(User {
            id: ids.get(i).unwrap_or(0),
            name: av_str(df.column("name")?.get(i)?),
            email: av_str(df.column("email")?.get(i)?),
            password_hash: av_str(df.column("password_hash")?.get(i)?),
        });
    }
    Ok(out)
}

pub(crate) fn posts_to_df(posts: &[BlogPost]) -> Result<DataFrame> {
    let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
    let titles: Vec<String> = posts.iter().map(|p| p.title.clone()).collect();
    let subtitles: Vec<String> = posts.iter().map(|p| p.subtitle.clone()).collect();
    let bodies: Vec<String> = posts.iter().map(|p| p.body.clone()).collect();
    let img_urls: Vec<String> = posts.iter().map(|p| p.img_url.clone()).collect();
    let dates: Vec<String> = posts.iter().map(|p| p.date.clone()).collect();
    let author_ids: Vec<i64> = posts.iter().map(|p| p.author_id).collect();
    let df = DataFrame::new(vec![
        Series::new("id".into(), ids).into(),
        Series::new("title".into(), titles).into(),
        Series::new("subtitle".into(), subtitles).into(),
        Series::new("body".into(), bodies).into(),
        Series::new("img_url".into(), img_urls).into(),
        Series::new("date".into(), dates).into(),
        Series::new("author_id".into(), author_ids).into(),
    ])?;
    Ok(df)
}

pub(crate) fn posts_from_df(df: &DataFrame) -> Result<Vec<BlogPost>> {
    let ids = df.column("id")?.i64()?;
    let author_ids = df.column("author_id")?.i64()?;
    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        out.push(BlogPost {
            id: ids.get(i).unwrap_or(0),
            title: av_str(df.column("title")?.get(i)?),
            subtitle: av_str(df.column("subtitle")?.get(i)?),
            body: av_str(df.column("body")?.get(i)?),
            img_url: av_str(df.column("img_url")?.get(i)?),
            date: av_str(df.column("date")?.get(i)?),
            author_id: author_ids.get(i).unwrap_or(0),
        });
    }
    Ok(out)
}

pub(crate) fn comments_to_df(comments: &[Comment]) -> Result<DataFrame> {
    let ids: Vec<i64> = comments.iter().map(|c| c.id).collect();
    let texts: Vec<String> = comments.iter().map(|c| c.text.clone()).collect();
    let author_ids: Vec<i64> = comments.iter().map(|c| c.author_id).collect();
    let post_ids: Vec<i64> = comments.iter().map(|c| c.post_id).collect();
    let df = DataFrame::new(vec![
        Series::new("id".into(), ids).into(),
        Series::new("text".into(), texts).into(),
        Series::new("author_id".into(), author_ids).into(),
        Series::new("post_id".into(), post_ids).into(),
    ])?;
    Ok(df)
}

pub(crate) fn comments_from_df(df: &DataFrame) -> Result<Vec<Comment>> {
    let ids = df.column("id")?.i64()?;
    let author_ids = df.column("author_id")?.i64()?;
    let post_ids = df.column("post_id")?.i64()?;
    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        out.push(Comment {
            id: ids.get(i).unwrap_or(0),
            text: av_str(df.column("text")?.get(i)?),
            author_id: author_ids.get(i).unwrap_or(0),
            post_id: post_ids.get(i).unwrap_or(0),
        });
    }
    Ok(out)
}
