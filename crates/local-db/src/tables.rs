//! Column identifiers for the query builders.

use sea_query::Iden;

#[derive(Iden)]
pub enum Repos {
    Table,
    Id,
    Repo,
    CreatedAt,
}

#[derive(Iden)]
pub enum SyncJobs {
    Table,
    Id,
    RepoId,
    SyncType,
    Status,
    CreatedAt,
    StartedAt,
    DoneAt,
}

#[derive(Iden)]
pub enum GitRefs {
    Table,
    RepoId,
    FullName,
    Name,
    Hash,
    Remote,
    Target,
    Type,
    TagCommitHash,
    SyncedAt,
}

#[derive(Iden)]
pub enum ServiceAuthCredentials {
    Table,
    Id,
    Type,
    Credentials,
    CreatedAt,
}
