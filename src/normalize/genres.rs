//! Genre synonym table
//!
//! Regional and provider-specific category names collapse to one English
//! genre set. Lookups are case-insensitive; compound `Parent/Child` names
//! fall back to the child, then the parent.

use std::collections::HashMap;
use std::sync::OnceLock;

const GENRE_SYNONYMS: &[(&str, &str)] = &[
    // News
    ("Información/Informativo", "News"), ("Informativo", "News"), ("Aktuelles", "News"),
    ("Nachrichten", "News"), ("Notizie", "News"), ("Attualità", "News"), ("Nieuws", "News"),
    ("Actualiteiten", "News"), ("Actualités", "News"), ("Informations", "News"),
    ("Notícias", "News"), ("Atualidades", "News"), ("Wiadomości", "News"),
    ("Aktualności", "News"),
    // Documentary
    ("Información/Reportaje", "Documentary"), ("Información/Documental", "Documentary"),
    ("Cultura/Historia", "Documentary"), ("Reportaje", "Documentary"),
    ("Historia", "Documentary"), ("Documental/Otros", "Documentary"),
    ("Dokumentation", "Documentary"), ("Dokufilm", "Documentary"),
    ("Dokuserie", "Documentary"), ("Dokumentarfilm", "Documentary"),
    ("Documentario", "Documentary"), ("Documentaire", "Documentary"),
    ("Documentário", "Documentary"), ("Dokumentalny", "Documentary"),
    // News Magazine
    ("Información/Magazine", "News Magazine"),
    // Sports
    ("Información/Deportivo", "Sports"), ("Deportes", "Sports"), ("Deportes/Fútbol", "Sports"),
    ("Deportes/Baloncesto", "Sports"), ("Deportes/Tenis", "Sports"),
    ("Deportes/Ciclismo", "Sports"), ("Fútbol", "Sports"), ("Baloncesto", "Sports"),
    ("Tenis", "Sports"), ("Ciclismo", "Sports"), ("Sport", "Sports"),
    ("Sportsendung", "Sports"), ("Fußball", "Sports"), ("Calcio", "Sports"),
    ("Voetbal", "Sports"), ("Football", "Sports"), ("Desporto", "Sports"),
    ("Futebol", "Sports"), ("Piłka nożna", "Sports"),
    // Weather
    ("Información/Meteorología", "Weather"),
    // Politics
    ("Información/Política", "Politics"),
    // Talk Show
    ("Entretenimiento/Corazon y sociedad", "Talk Show"), ("Debate", "Talk Show"),
    ("Corazón y sociedad", "Talk Show"), ("Talk", "Talk Show"), ("Talkshow", "Talk Show"),
    ("Talk Show", "Talk Show"), ("Talk-show", "Talk Show"),
    // Comedy
    ("Entretenimiento/Humor", "Comedy"), ("Cine/Comedia", "Comedy"),
    ("Serie/Comedia", "Comedy"), ("Humor", "Comedy"), ("Comedia", "Comedy"),
    ("Komödie", "Comedy"), ("Komödienfilm", "Comedy"), ("Komödienserie", "Comedy"),
    ("Commedia", "Comedy"), ("Komedie", "Comedy"), ("Comédie", "Comedy"),
    ("Comédia", "Comedy"), ("Komedia", "Comedy"),
    // Entertainment
    ("Entretenimiento/Variedades", "Entertainment"), ("Variedades", "Entertainment"),
    ("Entretenimiento", "Entertainment"), ("Show", "Entertainment"),
    ("Unterhaltung", "Entertainment"), ("Spettacolo", "Entertainment"),
    ("Intrattenimento", "Entertainment"), ("Mondo e Tendenze", "Entertainment"),
    ("Amusement", "Entertainment"), ("Entertainment", "Entertainment"),
    ("Divertissement", "Entertainment"), ("Entretenimento", "Entertainment"),
    ("Rozrywka", "Entertainment"),
    // Game Show
    ("Entretenimiento/Concurso", "Game Show"), ("Ocio y Aficiones/Juegos", "Game Show"),
    ("Concurso", "Game Show"), ("Quiz", "Game Show"), ("Gameshow", "Game Show"),
    ("Giochi", "Game Show"), ("Jeu", "Game Show"),
    // Reality
    ("Entretenimiento/Reality show", "Reality"),
    ("Reality-TV", "Reality"), ("Reality", "Reality"), ("Téléréalité", "Reality"),
    ("Reality Show", "Reality"),
    // Music
    ("Entretenimiento/Musical", "Music"), ("Música", "Music"), ("Música/Pop-Rock", "Music"),
    ("Música/Jazz", "Music"), ("Musical", "Music"), ("Musik", "Music"),
    ("Musiksendung", "Music"), ("Musikfilm", "Music"), ("Konzert", "Music"),
    ("Musica", "Music"), ("Muziek", "Music"), ("Musique", "Music"), ("Muzyka", "Music"),
    // Movie
    ("Cine/Película", "Movie"), ("Película", "Movie"), ("Film", "Movie"), ("Filme", "Movie"),
    // Drama
    ("Cine/Drama", "Drama"), ("Serie/Drama", "Drama"), ("Drama", "Drama"),
    ("Dramafilm", "Drama"), ("Dramaserie", "Drama"), ("Drammatico", "Drama"),
    ("Dramma", "Drama"), ("Drame", "Drama"), ("Dramat", "Drama"),
    // Action
    ("Cine/Acción", "Action"), ("Serie/Acción", "Action"), ("Acción", "Action"),
    ("Action", "Action"), ("Actionfilm", "Action"), ("Actionkomödie", "Action"),
    ("Actionserie", "Action"), ("Actionthriller", "Action"), ("Azione", "Action"),
    ("Actie", "Action"), ("Actiekomedie", "Action"), ("Actieserie", "Action"),
    ("Ação", "Action"), ("Akcja", "Action"),
    // Thriller
    ("Cine/Thriller", "Thriller"), ("Serie/Thriller", "Thriller"), ("Thriller", "Thriller"),
    ("Psychothriller", "Thriller"), ("Thrillerserie", "Thriller"),
    // Horror
    ("Cine/Terror", "Horror"), ("Terror", "Horror"), ("Horror", "Horror"),
    ("Horrorfilm", "Horror"), ("Horrorserie", "Horror"), ("Horreur", "Horror"),
    // Adventure
    ("Cine/Aventuras", "Adventure"), ("Aventuras", "Adventure"), ("Abenteuer", "Adventure"),
    ("Avventura", "Adventure"), ("Avontuur", "Adventure"), ("Aventure", "Adventure"),
    ("Aventura", "Adventure"), ("Przygodowy", "Adventure"),
    // Science Fiction
    ("Cine/Ciencia ficción", "Science Fiction"), ("Serie/Ciencia ficción", "Science Fiction"),
    ("Ciencia ficción", "Science Fiction"), ("Science Fiction", "Science Fiction"),
    ("Science-Fiction", "Science Fiction"), ("Sci-Fi", "Science Fiction"),
    ("Fantascienza", "Science Fiction"),
    ("Ficção Científica", "Science Fiction"),
    // Romance
    ("Cine/Romance", "Romance"), ("Romance", "Romance"), ("Romantik", "Romance"),
    ("Liebesfilm", "Romance"), ("Liebesdrama", "Romance"), ("Romantico", "Romance"),
    ("Romantiek", "Romance"), ("Romans", "Romance"),
    // Western
    ("Cine/Western", "Western"), ("Western", "Western"), ("Westernfilm", "Western"),
    ("Westernserie", "Western"),
    // War
    ("Cine/Bélico", "War"), ("Bélico", "War"), ("Kriegsfilm", "War"), ("Kriegsdrama", "War"),
    ("Guerra", "War"), ("Oorlog", "War"), ("Guerre", "War"), ("Wojenny", "War"),
    // Historical
    ("Cine/Histórico", "Historical"), ("Histórico", "Historical"),
    ("Historienfilm", "Historical"), ("Storico", "Historical"), ("Historisch", "Historical"),
    ("Historique", "Historical"), ("Historyczny", "Historical"),
    // Romantic Comedy
    ("Cine/Comedia romántica", "Romantic Comedy"),
    // Motorsport
    ("Deportes/Motor", "Motorsport"), ("Motor", "Motorsport"), ("Motorsport", "Motorsport"),
    ("Autorennen", "Motorsport"), ("Motori", "Motorsport"), ("Automobile", "Motorsport"),
    ("Automobilismo", "Motorsport"),
    // Animation
    ("Infantil/Dibujos animados", "Animation"), ("Dibujos animados", "Animation"),
    ("Animation", "Animation"), ("Animationsfilm", "Animation"),
    ("Animationsserie", "Animation"), ("Animazione", "Animation"),
    ("Cartoni Animati", "Animation"), ("Anime", "Animation"), ("Animatie", "Animation"),
    ("Animatieserie", "Animation"), ("Animação", "Animation"), ("Animacja", "Animation"),
    // Children
    ("Infantil/Juvenil", "Children"), ("Juvenil", "Children"), ("Kindersendung", "Children"),
    ("Kinderfilm", "Children"), ("Kinderserie", "Children"), ("Jugendserie", "Children"),
    ("Jugendfilm", "Children"), ("Ragazzi e Musica", "Children"), ("Bambini", "Children"),
    ("Kinderen", "Children"), ("Jeugd", "Children"), ("Jeunesse", "Children"),
    ("Infantil", "Children"), ("Dla dzieci", "Children"),
    // Educational
    ("Infantil/Educativo", "Educational"), ("Educativo", "Educational"),
    ("Bildung", "Educational"), ("Bildungsprogramm", "Educational"),
    ("Educatief", "Educational"), ("Éducatif", "Educational"), ("Edukacyjny", "Educational"),
    // Arts
    ("Cultura/Arte", "Arts"), ("Arte", "Arts"),
    // Science
    ("Cultura/Ciencia", "Science"), ("Ciencia", "Science"), ("Wissenschaft", "Science"),
    ("Scienza", "Science"), ("Wetenschap", "Science"), ("Science", "Science"),
    ("Ciência", "Science"), ("Nauka", "Science"),
    // Nature
    ("Cultura/Naturaleza", "Nature"), ("Ocio y Aficiones/Naturaleza", "Nature"),
    ("Naturaleza", "Nature"), ("Natur", "Nature"), ("Naturdokumentation", "Nature"),
    ("Tierdokumentation", "Nature"), ("Natura", "Nature"), ("Natuur", "Nature"),
    ("Nature", "Nature"), ("Natureza", "Nature"), ("Przyroda", "Nature"),
    // Religious
    ("Cultura/Religioso", "Religious"), ("Religioso", "Religious"),
    // Crime
    ("Serie/Policiaca", "Crime"), ("Policiaca", "Crime"), ("Series/Policíaca", "Crime"),
    ("Krimi", "Crime"), ("Krimiserie", "Crime"), ("Kriminalfilm", "Crime"),
    ("Poliziesco", "Crime"), ("Giallo", "Crime"), ("Misdaad", "Crime"), ("Policier", "Crime"),
    ("Policial", "Crime"), ("Kryminalny", "Crime"),
    // Travel
    ("Ocio y Aficiones/Viajes", "Travel"), ("Viajes", "Travel"), ("Reise", "Travel"),
    ("Reisebericht", "Travel"), ("Reisedokumentation", "Travel"), ("Viaggi", "Travel"),
    ("Reizen", "Travel"), ("Voyage", "Travel"), ("Viagem", "Travel"), ("Podróże", "Travel"),
    // Food
    ("Ocio y Aficiones/Gastronomía", "Food"), ("Gastronomía", "Food"),
    ("Ocio y Aficiones/Cocina", "Food"), ("Cocina", "Food"), ("Kochsendung", "Food"),
    ("Kochen", "Food"), ("Cucina", "Food"), ("Koken", "Food"), ("Cuisine", "Food"),
    ("Culinária", "Food"), ("Kuchnia", "Food"),
    // Lifestyle
    ("Ocio y Aficiones/Decoración", "Lifestyle"), ("Decoración", "Lifestyle"),
    ("Lifestyle", "Lifestyle"),
    // Automotive
    ("Ocio y Aficiones/Motor", "Automotive"),
    // Classical Music
    ("Música/Clásica", "Classical Music"),
    // Performing Arts
    ("Teatro", "Performing Arts"), ("Danza", "Performing Arts"), ("Opera", "Performing Arts"),
    // Soap Opera
    ("Telenovela", "Soap Opera"), ("Serie/Telenovela", "Soap Opera"), ("Soap", "Soap Opera"),
    ("Seifenoper", "Soap Opera"), ("Soap Opera", "Soap Opera"), ("Feuilleton", "Soap Opera"),
    ("Opera mydlana", "Soap Opera"),
    // Magazine
    ("Magacín", "Magazine"), ("Magazine", "Magazine"), ("Magazin", "Magazine"),
    ("Magazyn", "Magazine"),
    // Adult
    ("Erótico", "Adult"),
    // Other
    ("Otros", "Other"), ("Altri Programmi", "Other"), ("Altri", "Other"), ("Altro", "Other"),
    // Fantasy
    ("Fantasy", "Fantasy"), ("Fantasyfilm", "Fantasy"), ("Fantasyserie", "Fantasy"),
    ("Fantastique", "Fantasy"), ("Fantasia", "Fantasy"),
    // Series
    ("Serie TV", "Series"), ("Serie", "Series"), ("Série", "Series"), ("Serial", "Series"),
];

fn synonyms() -> &'static HashMap<String, &'static str> {
    static TABLE: OnceLock<HashMap<String, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = HashMap::with_capacity(GENRE_SYNONYMS.len());
        for (name, canonical) in GENRE_SYNONYMS {
            table.entry(name.to_lowercase()).or_insert(*canonical);
        }
        table
    })
}

fn lookup(name: &str) -> Option<&'static str> {
    synonyms().get(&name.trim().to_lowercase()).copied()
}

/// Canonical genre for `genre`, or `None` when the table has no entry
pub fn canonical_genre(genre: &str) -> Option<&'static str> {
    let genre = genre.trim();
    if genre.is_empty() {
        return None;
    }
    if let Some(found) = lookup(genre) {
        return Some(found);
    }

    let (parent, child) = genre.split_once('/')?;
    let child = child.split('/').next().unwrap_or(child);
    lookup(child).or_else(|| lookup(parent))
}

/// Map a genre through the synonym table, passing unknown genres through
pub fn map_genre(genre: &str) -> String {
    canonical_genre(genre)
        .map(str::to_string)
        .unwrap_or_else(|| genre.trim().to_string())
}
