//! GraphQL schema: the query/mutation protocol over events and artist search.
//!
//! Resolvers only wire the caller identity (resolved per-request from the
//! cookie by the auth gate) into the access-control layer; errors ride in the
//! per-operation error list while the HTTP status stays 200.

use async_graphql::{
    ComplexObject, Context, EmptySubscription, Error, ErrorExtensions, InputObject, Object,
    Result, Schema, SimpleObject, ID,
};
use std::sync::Arc;

use crate::api::auth::Caller;
use crate::db::{Artist, DbPool, Event, EventInput};
use crate::events::{self, EventError};
use crate::spotify::{SpotifyClient, SpotifyError};

pub type AppSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema(pool: DbPool, spotify: Arc<SpotifyClient>) -> AppSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(pool)
        .data(spotify)
        .finish()
}

#[derive(SimpleObject)]
#[graphql(name = "Artist", complex)]
pub struct ArtistObject {
    #[graphql(skip)]
    artist_id: Option<String>,
    pub name: String,
    pub href: Option<String>,
    pub image_url: Option<String>,
}

#[ComplexObject]
impl ArtistObject {
    /// Display id; artists never matched upstream fall back to their name.
    async fn id(&self) -> ID {
        ID(self
            .artist_id
            .clone()
            .unwrap_or_else(|| self.name.clone()))
    }
}

impl From<Artist> for ArtistObject {
    fn from(artist: Artist) -> Self {
        Self {
            artist_id: artist.id,
            name: artist.name,
            href: artist.href,
            image_url: artist.image_url,
        }
    }
}

#[derive(SimpleObject)]
#[graphql(name = "Event")]
pub struct EventObject {
    pub id: ID,
    pub name: String,
    pub date_from: String,
    pub date_to: String,
    pub location: Vec<f64>,
    pub artists: Vec<ArtistObject>,
    pub created_by: ID,
}

impl From<Event> for EventObject {
    fn from(event: Event) -> Self {
        Self {
            id: ID(event.id),
            name: event.name,
            date_from: event.date_from,
            date_to: event.date_to,
            location: event.location,
            artists: event.artists.into_iter().map(ArtistObject::from).collect(),
            created_by: ID(event.created_by),
        }
    }
}

#[derive(InputObject)]
pub struct ArtistInput {
    pub id: Option<String>,
    pub name: String,
    pub href: Option<String>,
    pub image_url: Option<String>,
}

impl From<ArtistInput> for Artist {
    fn from(input: ArtistInput) -> Self {
        Self {
            id: input.id,
            name: input.name,
            href: input.href,
            image_url: input.image_url,
        }
    }
}

fn event_input(
    name: String,
    date_from: String,
    date_to: String,
    location: Vec<f64>,
    artists: Option<Vec<ArtistInput>>,
) -> EventInput {
    EventInput {
        name,
        date_from,
        date_to,
        location,
        artists: artists
            .unwrap_or_default()
            .into_iter()
            .map(Artist::from)
            .collect(),
    }
}

fn graphql_error(err: EventError) -> Error {
    match err {
        EventError::Validation(fields) => {
            Error::new("ValidationError").extend_with(|_, ext| {
                for (field, messages) in &fields {
                    ext.set(field.as_str(), messages.join(", "));
                }
            })
        }
        other => Error::new(other.to_string()),
    }
}

fn upstream_error(err: SpotifyError) -> Error {
    Error::new(err.to_string())
}

fn caller_of<'a>(ctx: &'a Context<'_>) -> Option<&'a Caller> {
    ctx.data_unchecked::<Option<Caller>>().as_ref()
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Every event, irrespective of owner.
    async fn events(&self, ctx: &Context<'_>) -> Result<Vec<EventObject>> {
        let pool = ctx.data_unchecked::<DbPool>();
        let events = events::list_all(pool, caller_of(ctx))
            .await
            .map_err(graphql_error)?;
        Ok(events.into_iter().map(EventObject::from).collect())
    }

    /// Only the caller's own events.
    async fn my_events(&self, ctx: &Context<'_>) -> Result<Vec<EventObject>> {
        let pool = ctx.data_unchecked::<DbPool>();
        let events = events::list_mine(pool, caller_of(ctx))
            .await
            .map_err(graphql_error)?;
        Ok(events.into_iter().map(EventObject::from).collect())
    }
}

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn create_event(
        &self,
        ctx: &Context<'_>,
        name: String,
        date_from: String,
        date_to: String,
        location: Vec<f64>,
        artists: Option<Vec<ArtistInput>>,
    ) -> Result<EventObject> {
        let pool = ctx.data_unchecked::<DbPool>();
        let input = event_input(name, date_from, date_to, location, artists);
        let event = events::create(pool, caller_of(ctx), input)
            .await
            .map_err(graphql_error)?;
        Ok(EventObject::from(event))
    }

    async fn update_event(
        &self,
        ctx: &Context<'_>,
        event_id: ID,
        name: String,
        date_from: String,
        date_to: String,
        location: Vec<f64>,
        artists: Option<Vec<ArtistInput>>,
    ) -> Result<EventObject> {
        let pool = ctx.data_unchecked::<DbPool>();
        let input = event_input(name, date_from, date_to, location, artists);
        let event = events::update(pool, caller_of(ctx), &event_id, input)
            .await
            .map_err(graphql_error)?;
        Ok(EventObject::from(event))
    }

    async fn delete_event(&self, ctx: &Context<'_>, event_id: ID) -> Result<bool> {
        let pool = ctx.data_unchecked::<DbPool>();
        events::delete(pool, caller_of(ctx), &event_id)
            .await
            .map_err(graphql_error)
    }

    /// Artist search against the external catalog.
    async fn search_artist(&self, ctx: &Context<'_>, name: String) -> Result<Vec<ArtistObject>> {
        if caller_of(ctx).is_none() {
            return Err(Error::new("Unauthorized"));
        }

        let spotify = ctx.data_unchecked::<Arc<SpotifyClient>>();
        let artists = spotify
            .search_artists(&name)
            .await
            .map_err(upstream_error)?;
        Ok(artists.into_iter().map(ArtistObject::from).collect())
    }
}
