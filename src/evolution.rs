use crate::error::{invalid, EvolveError, EvolveResult};
use crate::generator::generate_melody;
use crate::melody::{Melody, Scale};
use crate::mutation::mutate;
use crate::params::{FitnessParameters, MutationParameters};
pub use crate::rating::Ratings;
use crate::rating::rate_melodies;
use crate::settings::Settings;
use ordered_float::OrderedFloat;
use rand::Rng;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

pub type MelodyId = usize;
pub type GenerationId = usize;
pub type Population = BTreeMap<MelodyId, Melody>;

pub const INITIAL_GENERATION: GenerationId = 1;
/// Parents carried into each fast-forwarded round.
pub const SURVIVORS: usize = 2;

/// Melody ids ordered by descending rating total. Equal totals keep
/// ascending id order.
pub fn rank(melodies: &Population, ratings: &Ratings) -> EvolveResult<Vec<MelodyId>> {
    let mut totals = Vec::with_capacity(melodies.len());
    for id in melodies.keys() {
        match ratings.get(id) {
            Some(rating) => totals.push((*id, rating.total())),
            None => return invalid(format!("melody {id} has no rating")),
        }
    }
    totals.sort_by_key(|(_, total)| Reverse(OrderedFloat(*total)));
    Ok(totals.into_iter().map(|(id, _)| id).collect())
}

/// The `count` best rated melodies, keyed by their original ids.
pub fn select_survivors(
    melodies: &Population,
    ratings: &Ratings,
    count: usize,
) -> EvolveResult<Population> {
    Ok(rank(melodies, ratings)?
        .into_iter()
        .take(count)
        .filter_map(|id| melodies.get(&id).map(|m| (id, m.clone())))
        .collect())
}

/// Runs `n` rounds of survivor selection, mutation and rating without
/// keeping any intermediate round. Returns the last round's children and
/// their ratings, or copies of the inputs when `n` is zero.
pub fn skip_generations<R: Rng + ?Sized>(
    melodies: &Population,
    ratings: &Ratings,
    scale: &Scale,
    mutation: &MutationParameters,
    fitness: &FitnessParameters,
    n: usize,
    rng: &mut R,
) -> EvolveResult<(Population, Ratings)> {
    let mut melodies = melodies.clone();
    let mut ratings = ratings.clone();
    for round in 0..n {
        let parents = select_survivors(&melodies, &ratings, SURVIVORS)?;
        melodies = mutate(&parents, scale, mutation, rng)?;
        ratings = rate_melodies(&melodies, fitness)?;
        log::debug!("skipped round {} of {n}: parents {:?}", round + 1, parents.keys().collect::<Vec<_>>());
    }
    Ok((melodies, ratings))
}

/// Persistence for generations of melodies, their ratings, and the user's
/// choice of parents within each generation.
pub trait GenerationStore {
    fn melodies(&self, generation: GenerationId) -> Option<&Population>;
    fn ratings(&self, generation: GenerationId) -> Option<&Ratings>;
    fn store_melodies(&mut self, generation: GenerationId, melodies: Population);
    fn store_ratings(&mut self, generation: GenerationId, ratings: Ratings);
    fn latest_generation(&self) -> Option<GenerationId>;

    /// Marks a melody as a parent for the next step. Selecting twice is the
    /// same as selecting once.
    fn select(&mut self, generation: GenerationId, id: MelodyId) -> EvolveResult<()>;
    fn deselect(&mut self, generation: GenerationId, id: MelodyId);
    fn selected(&self, generation: GenerationId) -> Vec<MelodyId>;
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    generations: BTreeMap<GenerationId, Population>,
    ratings: BTreeMap<GenerationId, Ratings>,
    selections: BTreeMap<GenerationId, BTreeSet<MelodyId>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.generations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }
}

impl GenerationStore for MemoryStore {
    fn melodies(&self, generation: GenerationId) -> Option<&Population> {
        self.generations.get(&generation)
    }

    fn ratings(&self, generation: GenerationId) -> Option<&Ratings> {
        self.ratings.get(&generation)
    }

    fn store_melodies(&mut self, generation: GenerationId, melodies: Population) {
        self.generations.insert(generation, melodies);
    }

    fn store_ratings(&mut self, generation: GenerationId, ratings: Ratings) {
        self.ratings.insert(generation, ratings);
    }

    fn latest_generation(&self) -> Option<GenerationId> {
        self.generations.keys().next_back().copied()
    }

    fn select(&mut self, generation: GenerationId, id: MelodyId) -> EvolveResult<()> {
        let melodies = self
            .generations
            .get(&generation)
            .ok_or(EvolveError::UnknownGeneration(generation))?;
        if !melodies.contains_key(&id) {
            return Err(EvolveError::UnknownMelody { generation, id });
        }
        self.selections.entry(generation).or_default().insert(id);
        Ok(())
    }

    fn deselect(&mut self, generation: GenerationId, id: MelodyId) {
        if let Some(chosen) = self.selections.get_mut(&generation) {
            chosen.remove(&id);
        }
    }

    fn selected(&self, generation: GenerationId) -> Vec<MelodyId> {
        self.selections
            .get(&generation)
            .map(|chosen| chosen.iter().copied().collect())
            .unwrap_or_default()
    }
}

/// Drives evolution against a store. Every operation that produces a
/// generation writes it, with its ratings, under the next generation id.
pub struct Evolution<S, R> {
    store: S,
    rng: R,
    scale: Scale,
    mutation: MutationParameters,
    fitness: FitnessParameters,
}

impl<S: GenerationStore, R: Rng> Evolution<S, R> {
    pub fn new(
        store: S,
        rng: R,
        scale: Scale,
        mutation: MutationParameters,
        fitness: FitnessParameters,
    ) -> Self {
        Evolution {
            store,
            rng,
            scale,
            mutation,
            fitness,
        }
    }

    pub fn from_settings(store: S, rng: R, settings: &Settings) -> Self {
        Self::new(
            store,
            rng,
            settings.key.scale().clone(),
            settings.desired_mutation_parameters,
            settings.desired_fitness_parameters.clone(),
        )
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn scale(&self) -> &Scale {
        &self.scale
    }

    /// Generates `count` fresh melodies as the first generation.
    pub fn seed(&mut self, count: usize) -> EvolveResult<GenerationId> {
        let melodies = (1..=count)
            .map(|id| (id, generate_melody(&self.scale, &mut self.rng)))
            .collect::<Population>();
        let ratings = rate_melodies(&melodies, &self.fitness)?;
        self.persist(INITIAL_GENERATION, melodies, ratings);
        Ok(INITIAL_GENERATION)
    }

    /// Breeds the melodies `ids` of `generation` into the next generation.
    pub fn step(&mut self, generation: GenerationId, ids: &[MelodyId]) -> EvolveResult<GenerationId> {
        let population = self
            .store
            .melodies(generation)
            .ok_or(EvolveError::UnknownGeneration(generation))?;
        let mut parents = Population::new();
        for id in ids {
            let melody = population
                .get(id)
                .ok_or(EvolveError::UnknownMelody { generation, id: *id })?;
            parents.insert(*id, melody.clone());
        }
        let children = mutate(&parents, &self.scale, &self.mutation, &mut self.rng)?;
        let ratings = rate_melodies(&children, &self.fitness)?;
        self.persist(generation + 1, children, ratings);
        Ok(generation + 1)
    }

    pub fn step_selected(&mut self, generation: GenerationId) -> EvolveResult<GenerationId> {
        let ids = self.store.selected(generation);
        self.step(generation, &ids)
    }

    /// Evolves `n` rounds from `generation` by rating alone and stores only
    /// the outcome of the last round.
    pub fn fast_forward(&mut self, generation: GenerationId, n: usize) -> EvolveResult<GenerationId> {
        let melodies = self
            .store
            .melodies(generation)
            .ok_or(EvolveError::UnknownGeneration(generation))?;
        let ratings = self
            .store
            .ratings(generation)
            .ok_or(EvolveError::UnknownGeneration(generation))?;
        if n == 0 {
            return Ok(generation);
        }
        let (melodies, ratings) = skip_generations(
            melodies,
            ratings,
            &self.scale,
            &self.mutation,
            &self.fitness,
            n,
            &mut self.rng,
        )?;
        self.persist(generation + 1, melodies, ratings);
        Ok(generation + 1)
    }

    fn persist(&mut self, generation: GenerationId, melodies: Population, ratings: Ratings) {
        log::info!("storing generation {generation} ({} melodies)", melodies.len());
        self.store.store_melodies(generation, melodies);
        self.store.store_ratings(generation, ratings);
    }
}
