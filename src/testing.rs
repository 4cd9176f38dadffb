use std::collections::{HashMap, HashSet};
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

use crate::handle::Handle;
use crate::pool::{Pool, PoolError};
use crate::reset::ResetStrategy;

pub type Item = i32;

// Junk the factory plants in every slot, and the value the reset strategy
// wipes it back to. Every allocation must observe FRESH, never leftovers.
const JUNK: Item = 123;
const FRESH: Item = 0;

struct ZeroReset;

impl ResetStrategy<Item> for ZeroReset {
    fn reset(&self, item: &mut Item) {
        *item = FRESH;
    }
}

struct Allocations {
    map: HashMap<Handle<Item>, usize>, // handle -> index in vec that contains handles
    vec: Vec<Handle<Item>>,
}

impl Allocations {
    pub fn new() -> Self {
        return Self {
            map: HashMap::default(),
            vec: Vec::new(),
        }
    }

    pub fn add(&mut self, handle: Handle<Item>) {
        self.map.insert(handle, self.vec.len());
        self.vec.push(handle);
    }

    // Removes handles in O(1) time by swapping the last one into the hole,
    // which keeps random-pick-and-remove cheap across long fuzz runs
    pub fn remove(&mut self, removed: Handle<Item>) {
        let index_of_removed: usize = *self.map.get(&removed).unwrap();
        let index_of_last: usize = self.vec.len() - 1;
        if index_of_removed != index_of_last {
            let last: Handle<Item> = self.vec[index_of_last];
            self.vec[index_of_removed] = last;
            self.map.insert(last, index_of_removed);
        }
        self.vec.pop().unwrap();
        self.map.remove(&removed);
    }

    pub fn get_random_handle<T: Rng>(&self, rng: &mut T) -> Option<Handle<Item>> {
        if self.vec.is_empty() {
            return None
        }

        let index: usize = rng.gen_range(0..self.len());
        return Some(self.vec[index])
    }

    pub fn len(&self) -> usize {
        return self.map.len()
    }

    pub fn handles(&self) -> impl Iterator<Item = &Handle<Item>> {
        return self.vec.iter()
    }
}

// Mutations
const SET: usize = 0;
const ALLOCATE: usize = 1;
const FREE: usize = 2;
const STALE_ACCESS: usize = 3;
const NUM_MUTATIONS: usize = 4;

#[allow(dead_code)]
#[derive(Clone, Copy, Debug)]
enum Mutation {
    Set { handle: Handle<Item>, value: Item },
    Allocate { value: Item },
    AllocateWhenFull,
    Free { handle: Handle<Item> },
    StaleAccess { handle: Handle<Item> },
}

struct MutationGenerator {
    tokens: [usize; NUM_MUTATIONS],
    total_num_tokens: usize,
}

impl MutationGenerator {
    const MAX_NUM_TOKENS: usize = 10;

    pub fn new<T: Rng>(rng: &mut T) -> Self {
        let mut tokens: [usize; NUM_MUTATIONS] = [0; NUM_MUTATIONS];
        let mut total_num_tokens: usize = 0;
        for mutation in 0..NUM_MUTATIONS {
            let num_tokens: usize = rng.gen_range(1..=Self::MAX_NUM_TOKENS);
            tokens[mutation] = num_tokens;
            total_num_tokens += num_tokens;
        }

        assert!(tokens.iter().cloned().all(|num_tokens| num_tokens > 0));

        return Self {
            tokens,
            total_num_tokens,
        }
    }

    pub fn generate<T: Rng>(&mut self, rng: &mut T) -> usize {
        let token: usize = rng.gen_range(1..=self.total_num_tokens);
        let mut num_tokens_so_far: usize = 0;
        for mutation in 0..self.tokens.len() {
            assert!(token > num_tokens_so_far);
            let token: usize = token - num_tokens_so_far;
            if token <= self.tokens[mutation] {
                return mutation
            }
            num_tokens_so_far += self.tokens[mutation];
        }
        unreachable!();
    }
}

#[derive(Debug)]
enum EqualityError {
    NumItemsDontMatch,
    ItemsDontMatch,
    GetsDontMatch,
    HandlesDontMatch,
}

fn compare_for_equality(
    pool: &Pool<Item, ZeroReset>,
    expected: &HashMap<Handle<Item>, Item>,
    allocations: &Allocations,
)
-> Result<(), EqualityError>
{
    if pool.len() != allocations.len() {
        return Err( EqualityError::NumItemsDontMatch )
    }

    let mut items_in_pool: Vec<Item> = pool.iter().copied().collect();
    let mut items_expected: Vec<Item> = expected.values().copied().collect();
    items_in_pool.sort();
    items_expected.sort();
    if items_in_pool != items_expected {
        return Err( EqualityError::ItemsDontMatch )
    }

    for handle in allocations.handles() {
        if pool.get(*handle).unwrap() != expected.get(handle) {
            return Err( EqualityError::GetsDontMatch )
        }
    }

    let live: HashSet<Handle<Item>> = pool.live_handles().collect();
    let tracked: HashSet<Handle<Item>> = allocations.handles().copied().collect();
    if live != tracked {
        return Err( EqualityError::HandlesDontMatch )
    }

    return Ok(())
}

fn fuzz<T: Rng>(rng: &mut T, num_mutations_to_try: usize) {
    const MAX_CAPACITY: usize = 64;
    let capacity: usize = rng.gen_range(1..=MAX_CAPACITY);

    let mut log: Vec<Mutation> = Vec::new();
    let mut allocations: Allocations = Allocations::new();
    let mut expected: HashMap<Handle<Item>, Item> = HashMap::new();
    let mut retired: Vec<Handle<Item>> = Vec::new();

    let mut pool: Pool<Item, ZeroReset> =
        Pool::with_reset(capacity, || JUNK, ZeroReset).unwrap();

    if let Err(error) = compare_for_equality(&pool, &expected, &allocations) {
        panic!("{:?} (capacity {})\n{:?}", error, capacity, log);
    }

    let mut generator: MutationGenerator = MutationGenerator::new(rng);
    for _ in 0..num_mutations_to_try {
        match generator.generate(rng) {
            SET => {
                if allocations.len() == 0 {
                    continue;
                }

                let handle: Handle<Item> = allocations.get_random_handle(rng).unwrap();
                let value: Item = generate_random_item(rng);
                *pool.get_mut(handle).unwrap().unwrap() = value;
                expected.insert(handle, value);

                log.push( Mutation::Set { handle, value } );
            },

            ALLOCATE => {
                if pool.len() == capacity {
                    // Exhaustion is an error to the caller but must not
                    // mutate the pool
                    assert_eq!(pool.new_item().err(), Some(PoolError::Exhausted { capacity }));
                    assert_eq!(pool.len(), capacity);
                    log.push( Mutation::AllocateWhenFull );
                    continue;
                }

                let handle: Handle<Item> = pool.new_item().unwrap();
                assert_eq!(*pool.get(handle).unwrap().unwrap(), FRESH);

                let value: Item = generate_random_item(rng);
                *pool.get_mut(handle).unwrap().unwrap() = value;
                allocations.add(handle);
                expected.insert(handle, value);

                log.push( Mutation::Allocate { value } );
            },

            FREE => {
                if allocations.len() == 0 {
                    continue;
                }

                let handle: Handle<Item> = allocations.get_random_handle(rng).unwrap();
                pool.free_item(handle).unwrap();
                allocations.remove(handle);
                expected.remove(&handle);
                retired.push(handle);

                log.push( Mutation::Free { handle } );
            },

            STALE_ACCESS => {
                if retired.is_empty() {
                    continue;
                }

                let handle: Handle<Item> = retired[ rng.gen_range(0..retired.len()) ];
                assert!(!pool.is_valid(handle));
                assert!(pool.get(handle).unwrap().is_none());

                // Re-freeing through a stale handle is a defined no-op
                let len_before: usize = pool.len();
                pool.free_item(handle).unwrap();
                assert_eq!(pool.len(), len_before);

                log.push( Mutation::StaleAccess { handle } );
            },

            _ => unreachable!(),
        }

        if let Err(error) = compare_for_equality(&pool, &expected, &allocations) {
            panic!("{:?} (capacity {})\n{:?}", error, capacity, log);
        }
    }
}

pub fn fuzz_many_pools_few_mutations() {
    const NUM_POOLS_TO_FUZZ: usize = 10_000;
    const MAX_NUM_MUTATIONS: usize = 10;
    fuzz_many_item_pools(NUM_POOLS_TO_FUZZ, MAX_NUM_MUTATIONS);
}

pub fn fuzz_few_pools_many_mutations() {
    const NUM_POOLS_TO_FUZZ: usize = 100;
    const MAX_NUM_MUTATIONS: usize = 1000;
    fuzz_many_item_pools(NUM_POOLS_TO_FUZZ, MAX_NUM_MUTATIONS);
}

fn fuzz_many_item_pools(num_pools_to_fuzz: usize, max_num_mutations: usize) {
    /*
        Xoshiro256StarStar is a deterministic PRNG that's seeded from the same value every time,
        which makes these tests consistently reproducible (you get exactly the same sequence of
        operations every single time fuzz_many_item_pools() is called)
    */
    const RNG_SEED: u64 = 2049;
    let mut rng: Xoshiro256StarStar = Xoshiro256StarStar::seed_from_u64(RNG_SEED);

    for _ in 0..num_pools_to_fuzz {
        fuzz(&mut rng, max_num_mutations);
    }
}

fn generate_random_item<T: Rng>(rng: &mut T) -> Item {
    return rng.gen_range(Item::MIN..=Item::MAX)
}
